use crate::core::arena::{Arena, BodyId};
use crate::core::finish_sequence::{FinishSequence, FinishSequencePars};
use crate::core::horse::{Horse, HorseId};
use crate::core::restart_handler::{RestartDecision, RestartHandler};
use crate::core::scoreboard::{ScoreStore, Scoreboard};
use crate::interfaces::presentation_interface::{
    AudioCue, DisplayTarget, DisplayUpdate, PresentationEvent, Presenter,
    MAX_DISPLAY_UPDATE_FREQUENCY,
};
use helpers::general::format_racetime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// * `countdown_duration` - (s) Length of the pre-race countdown
/// * `auto_restart_delay` - (s) Idle time after a finished race until it restarts by itself
/// * `confirm_window` - (s) Time within which a restart request must be confirmed
/// * `timestep_size` - (s) Fixed physics time step
#[derive(Debug, Deserialize, Clone)]
pub struct RacePars {
    #[serde(default = "default_countdown_duration")]
    pub countdown_duration: f64,
    #[serde(default = "default_auto_restart_delay")]
    pub auto_restart_delay: f64,
    #[serde(default = "default_confirm_window")]
    pub confirm_window: f64,
    #[serde(default = "default_timestep_size")]
    pub timestep_size: f64,
}

fn default_countdown_duration() -> f64 {
    4.0
}

fn default_auto_restart_delay() -> f64 {
    60.0
}

fn default_confirm_window() -> f64 {
    3.0
}

fn default_timestep_size() -> f64 {
    0.02
}

impl Default for RacePars {
    fn default() -> Self {
        RacePars {
            countdown_duration: default_countdown_duration(),
            auto_restart_delay: default_auto_restart_delay(),
            confirm_window: default_confirm_window(),
            timestep_size: default_timestep_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RaceState {
    Idle,
    Countdown,
    Racing,
    Finished,
    RestartPending,
}

impl Default for RaceState {
    fn default() -> Self {
        RaceState::Idle
    }
}

/// Race is the controller of a single race. It owns the roster and the scoreboard, and it is the
/// only place where the race state changes.
#[derive(Debug)]
pub struct Race {
    state: RaceState,
    horses: Vec<Horse>,
    roster: Vec<String>,
    scoreboard: Scoreboard,
    pub cur_racetime: f64,
    timer_running: bool,
    t_display_update: f64,
    countdown_remaining: f64,
    winning_horse: Option<HorseId>,
    finish_sequence: Option<FinishSequence>,
    restart_handler: RestartHandler,
    restart_countdown_shown: Option<u32>,
    countdown_duration: f64,
    finish_pars: FinishSequencePars,
}

impl Race {
    /// Creates an idle race. The scoreboard continues from the store if it holds any values.
    pub fn new(
        race_pars: &RacePars,
        finish_pars: &FinishSequencePars,
        horses: Vec<Horse>,
        store: &ScoreStore,
    ) -> Race {
        let roster: Vec<String> = horses.iter().map(|horse| horse.name.to_owned()).collect();
        let scoreboard = Scoreboard::adopt_or_initialize(&roster, store);

        Race {
            state: RaceState::Idle,
            horses,
            roster,
            scoreboard,
            cur_racetime: 0.0,
            timer_running: false,
            t_display_update: 0.0,
            countdown_remaining: 0.0,
            winning_horse: None,
            finish_sequence: None,
            restart_handler: RestartHandler::new(
                race_pars.auto_restart_delay,
                race_pars.confirm_window,
            ),
            restart_countdown_shown: None,
            countdown_duration: race_pars.countdown_duration,
            finish_pars: finish_pars.to_owned(),
        }
    }

    // ---------------------------------------------------------------------------------------------
    // STATE TRANSITIONS ---------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// start_countdown moves an idle race into the countdown.
    pub fn start_countdown(&mut self, presenter: &Presenter) {
        if self.state != RaceState::Idle {
            debug!(state = ?self.state, "ignoring countdown start");
            return;
        }

        self.state = RaceState::Countdown;
        self.countdown_remaining = self.countdown_duration;

        presenter.display(
            DisplayTarget::TimerText,
            DisplayUpdate::RaceTimer(format_racetime(0.0)),
        );
        presenter.display(
            DisplayTarget::ScoreboardText,
            DisplayUpdate::Scoreboard(self.scoreboard.render()),
        );
    }

    /// start_timer starts the race clock. Only the first call during the countdown has an effect.
    pub fn start_timer(&mut self) {
        if self.state != RaceState::Countdown {
            debug!(state = ?self.state, "ignoring timer start");
            return;
        }

        self.state = RaceState::Racing;
        self.countdown_remaining = 0.0;
        self.cur_racetime = 0.0;
        self.t_display_update = 0.0;
        self.timer_running = true;
        info!(horses = self.horses.len(), "race started");
    }

    /// report_finish accepts the first finish of the race and ignores every later one. Returns
    /// true if the report was accepted.
    pub fn report_finish(
        &mut self,
        horse: HorseId,
        arena: &mut Arena,
        presenter: &Presenter,
    ) -> bool {
        if self.state != RaceState::Racing {
            debug!(horse, state = ?self.state, "ignoring finish report");
            return false;
        }
        if horse >= self.horses.len() {
            warn!(horse, "finish report for a horse outside the roster");
            return false;
        }

        // latch the result before anything else can observe the race
        self.winning_horse = Some(horse);
        self.state = RaceState::Finished;
        self.timer_running = false;
        presenter.display(
            DisplayTarget::TimerText,
            DisplayUpdate::RaceTimer(format_racetime(self.cur_racetime)),
        );

        for h in self.horses.iter_mut() {
            h.stop(arena);
        }

        let winner = self.horses[horse].name.to_owned();
        let color = self.horses[horse].color;
        self.scoreboard.record_result(&winner);

        info!(
            winner = winner.as_str(),
            race_time = self.cur_racetime,
            "race finished"
        );

        presenter.audio(AudioCue::MusicStop);
        presenter.audio(AudioCue::Victory);
        presenter.send(PresentationEvent::Display(
            DisplayUpdate::Winner(winner.to_owned()),
        ));
        presenter.display(
            DisplayTarget::ScoreboardText,
            DisplayUpdate::Scoreboard(self.scoreboard.render()),
        );

        self.finish_sequence = Some(FinishSequence::start(
            &self.finish_pars,
            &winner,
            color,
            presenter,
        ));
        self.restart_handler.activate();
        self.restart_countdown_shown = None;

        true
    }

    /// request_restart runs the two-step confirmation. Requests outside of a finished race are
    /// ignored.
    pub fn request_restart(&mut self, full_reset: bool, presenter: &Presenter) {
        if self.state != RaceState::Finished {
            debug!(state = ?self.state, "ignoring restart request");
            return;
        }

        match self.restart_handler.request(full_reset) {
            RestartDecision::Armed { full_reset } => {
                let what = if full_reset {
                    "restart and reset the scoreboard"
                } else {
                    "restart"
                };
                presenter.send(PresentationEvent::Display(
                    DisplayUpdate::RestartPrompt(format!(
                        "Press R again within {:.0}s to {}",
                        self.restart_handler.confirm_window(),
                        what
                    )),
                ));
            }
            RestartDecision::Commit { full_reset } => self.commit_restart(full_reset, presenter),
            RestartDecision::None => {}
        }
    }

    /// register_interaction postpones the automatic restart.
    pub fn register_interaction(&mut self) {
        if self.state == RaceState::Finished {
            self.restart_handler.register_interaction();
        }
    }

    fn commit_restart(&mut self, full_reset: bool, presenter: &Presenter) {
        if let Some(sequence) = self.finish_sequence.as_mut() {
            sequence.cancel(presenter);
        }
        self.restart_handler.deactivate();

        if full_reset {
            info!("resetting scoreboard");
            self.scoreboard.reset(&self.roster);
        }

        self.state = RaceState::RestartPending;
        info!(full_reset, "restart committed");
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHOD ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// update advances the clocks and timed sequences of the race by one frame.
    pub fn update(&mut self, dt: f64, presenter: &Presenter) {
        match self.state {
            RaceState::Countdown => {
                self.countdown_remaining = (self.countdown_remaining - dt).max(0.0);
            }
            RaceState::Racing => {
                if self.timer_running {
                    self.cur_racetime += dt;

                    if self.cur_racetime
                        > self.t_display_update + 1.0 / MAX_DISPLAY_UPDATE_FREQUENCY - 1e-9
                    {
                        presenter.display(
                            DisplayTarget::TimerText,
                            DisplayUpdate::RaceTimer(format_racetime(self.cur_racetime)),
                        );
                        self.t_display_update = self.cur_racetime;
                    }
                }
            }
            RaceState::Finished => {
                if let Some(sequence) = self.finish_sequence.as_mut() {
                    sequence.update(dt, presenter);
                }

                let decision = self.restart_handler.update(dt);

                let secs = self.restart_handler.time_to_auto_restart().ceil() as u32;
                if self.restart_countdown_shown != Some(secs) {
                    presenter.display(
                        DisplayTarget::CountdownText,
                        DisplayUpdate::RestartCountdown(secs),
                    );
                    self.restart_countdown_shown = Some(secs);
                }

                if let RestartDecision::Commit { full_reset } = decision {
                    info!("no interaction, restarting automatically");
                    self.commit_restart(full_reset, presenter);
                }
            }
            RaceState::Idle | RaceState::RestartPending => {}
        }
    }

    // ---------------------------------------------------------------------------------------------
    // METHODS (HELPERS) ---------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn state(&self) -> RaceState {
        self.state
    }

    pub fn horses(&self) -> &[Horse] {
        &self.horses
    }

    pub fn horses_mut(&mut self) -> &mut [Horse] {
        &mut self.horses
    }

    pub fn horse_mut(&mut self, horse: HorseId) -> &mut Horse {
        &mut self.horses[horse]
    }

    pub fn horse_by_body(&self, body: BodyId) -> Option<HorseId> {
        self.horses.iter().position(|horse| horse.body == body)
    }

    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub fn winning_horse(&self) -> Option<&Horse> {
        self.winning_horse.map(|idx| &self.horses[idx])
    }

    pub fn countdown_remaining(&self) -> f64 {
        self.countdown_remaining
    }

    pub fn timer_running(&self) -> bool {
        self.timer_running
    }

    pub fn finish_sequence_done(&self) -> bool {
        self.finish_sequence
            .as_ref()
            .map_or(true, |sequence| sequence.is_done())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::arena::{ArenaPars, RigidBody};
    use crate::core::horse::HorsePars;
    use crate::interfaces::presentation_interface::{DisplayBindings, RgbColor, TimelineEvent};
    use nalgebra::Vector2;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup(store: &ScoreStore) -> (Arena, Race) {
        let mut arena = Arena::new(&ArenaPars::default());
        let mut horses = Vec::new();
        for (i, name) in ["Bolt", "Comet", "Dash"].iter().enumerate() {
            let pars = HorsePars::new(name, "red", [2.0, 4.0 + 4.0 * i as f64]);
            let body = arena.spawn(RigidBody::new(
                Vector2::new(pars.start_pos[0], pars.start_pos[1]),
                pars.radius,
                pars.mass,
            ));
            horses.push(Horse::new(i, &pars, RgbColor::default(), body));
        }
        let race = Race::new(
            &RacePars::default(),
            &FinishSequencePars::default(),
            horses,
            store,
        );
        (arena, race)
    }

    fn racing(race: &mut Race, arena: &mut Arena, presenter: &Presenter) {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        race.start_countdown(presenter);
        for horse in race.horses_mut() {
            horse.start_moving(arena, &mut rng);
        }
        race.start_timer();
    }

    #[test]
    fn lifecycle_runs_through_all_states() {
        let presenter = Presenter::headless();
        let (mut arena, mut race) = setup(&ScoreStore::new());
        assert_eq!(race.state(), RaceState::Idle);

        race.start_countdown(&presenter);
        assert_eq!(race.state(), RaceState::Countdown);
        assert_eq!(race.countdown_remaining(), 4.0);
        race.update(1.5, &presenter);
        assert_eq!(race.countdown_remaining(), 2.5);

        racing(&mut race, &mut arena, &presenter);
        assert_eq!(race.state(), RaceState::Racing);
        race.update(2.0, &presenter);
        assert_eq!(race.cur_racetime, 2.0);

        assert!(race.report_finish(1, &mut arena, &presenter));
        assert_eq!(race.state(), RaceState::Finished);
        assert_eq!(race.winning_horse().map(|h| h.name.as_str()), Some("Comet"));
        assert!(!race.timer_running());
        for horse in race.horses() {
            assert!(!horse.can_move);
            assert_eq!(arena.body(horse.body).speed(), 0.0);
            assert_eq!(arena.body(horse.body).angular_velocity, 0.0);
        }

        // clock is stopped
        race.update(1.0, &presenter);
        assert_eq!(race.cur_racetime, 2.0);

        race.update(61.0, &presenter);
        assert_eq!(race.state(), RaceState::RestartPending);
    }

    #[test]
    fn finish_is_latched_once() {
        let presenter = Presenter::headless();
        let (mut arena, mut race) = setup(&ScoreStore::new());
        racing(&mut race, &mut arena, &presenter);

        assert!(race.report_finish(2, &mut arena, &presenter));
        assert!(!race.report_finish(0, &mut arena, &presenter));
        assert!(!race.report_finish(2, &mut arena, &presenter));

        assert_eq!(race.winning_horse().map(|h| h.id), Some(2));
        let sb = race.scoreboard();
        assert_eq!(sb.entry("Dash").wins, 1);
        assert_eq!(sb.entry("Bolt").wins, 0);
        assert!(sb.entries().iter().all(|e| e.races == 1));
    }

    #[test]
    fn reports_outside_racing_are_ignored() {
        let presenter = Presenter::headless();
        let (mut arena, mut race) = setup(&ScoreStore::new());

        assert!(!race.report_finish(0, &mut arena, &presenter));
        race.start_countdown(&presenter);
        assert!(!race.report_finish(0, &mut arena, &presenter));
        assert_eq!(race.state(), RaceState::Countdown);
        assert!(race.winning_horse().is_none());
    }

    #[test]
    fn restart_requests_need_confirmation() {
        let presenter = Presenter::headless();
        let (mut arena, mut race) = setup(&ScoreStore::new());

        // ignored while idle
        race.request_restart(false, &presenter);
        race.request_restart(false, &presenter);
        assert_eq!(race.state(), RaceState::Idle);

        racing(&mut race, &mut arena, &presenter);
        race.report_finish(0, &mut arena, &presenter);

        race.request_restart(false, &presenter);
        assert_eq!(race.state(), RaceState::Finished);
        race.update(1.0, &presenter);
        race.request_restart(false, &presenter);
        assert_eq!(race.state(), RaceState::RestartPending);
        assert_eq!(race.scoreboard().entry("Bolt").wins, 1);
    }

    #[test]
    fn full_reset_clears_scoreboard() {
        let presenter = Presenter::headless();
        let (mut arena, mut race) = setup(&ScoreStore::new());
        racing(&mut race, &mut arena, &presenter);
        race.report_finish(0, &mut arena, &presenter);

        race.request_restart(true, &presenter);
        race.request_restart(true, &presenter);

        assert_eq!(race.state(), RaceState::RestartPending);
        assert!(race.scoreboard().entries().iter().all(|e| e.races == 0));
    }

    #[test]
    fn restart_cancels_running_finish_sequence() {
        let (tx, rx) = flume::unbounded();
        let presenter = Presenter::new(Some(tx), DisplayBindings::default());
        let (mut arena, mut race) = setup(&ScoreStore::new());
        racing(&mut race, &mut arena, &presenter);
        race.report_finish(0, &mut arena, &presenter);
        race.update(0.2, &presenter);
        assert!(!race.finish_sequence_done());

        race.request_restart(false, &presenter);
        race.request_restart(false, &presenter);

        assert!(race.finish_sequence_done());
        let prompt = rx.try_iter().any(|ev| {
            matches!(ev, PresentationEvent::Timeline(TimelineEvent::PromptRevealed(_)))
        });
        assert!(prompt);
    }

    #[test]
    fn scoreboard_is_adopted_from_store() {
        let presenter = Presenter::headless();
        let mut store = ScoreStore::new();
        let (mut arena, mut race) = setup(&store);
        racing(&mut race, &mut arena, &presenter);
        race.report_finish(1, &mut arena, &presenter);
        store.persist(race.scoreboard());

        let (_, next) = setup(&store);

        assert_eq!(next.scoreboard().entry("Comet").wins, 1);
        assert_eq!(next.scoreboard().entry("Dash").races, 1);
    }
}
