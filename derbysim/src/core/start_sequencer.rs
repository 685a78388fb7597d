use crate::core::arena::Arena;
use crate::core::race::Race;
use crate::interfaces::presentation_interface::{
    AudioCue, DisplayTarget, DisplayUpdate, PresentationEvent, Presenter,
};
use rand::Rng;
use serde::Deserialize;
use tracing::{error, info};

/// * `initial_delay` - (s) Pause before the first countdown value is shown
/// * `countdown_from` - First countdown value
/// * `countdown_interval` - (s) Time each countdown value is shown
/// * `go_duration` - (s) Time "GO!" is shown before the countdown text is cleared
#[derive(Debug, Deserialize, Clone)]
pub struct StartPars {
    #[serde(default = "default_initial_delay")]
    pub initial_delay: f64,
    #[serde(default = "default_countdown_from")]
    pub countdown_from: u32,
    #[serde(default = "default_countdown_interval")]
    pub countdown_interval: f64,
    #[serde(default = "default_go_duration")]
    pub go_duration: f64,
}

fn default_initial_delay() -> f64 {
    1.0
}

fn default_countdown_from() -> u32 {
    3
}

fn default_countdown_interval() -> f64 {
    1.0
}

fn default_go_duration() -> f64 {
    0.5
}

impl Default for StartPars {
    fn default() -> Self {
        StartPars {
            initial_delay: default_initial_delay(),
            countdown_from: default_countdown_from(),
            countdown_interval: default_countdown_interval(),
            go_duration: default_go_duration(),
        }
    }
}

impl StartPars {
    /// Total time from the start of the sequence until the horses are released.
    pub fn time_to_go(&self) -> f64 {
        self.initial_delay + self.countdown_from as f64 * self.countdown_interval
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    InitialDelay { t: f64 },
    Counting { value: u32, t: f64 },
    Go { t: f64 },
    Done,
}

/// StartSequencer drives the pre-race countdown and releases all horses at "GO!".
#[derive(Debug)]
pub struct StartSequencer {
    pars: StartPars,
    phase: Phase,
    started: bool,
}

impl StartSequencer {
    pub fn new(pars: &StartPars, presenter: &Presenter) -> StartSequencer {
        if let Err(err) = presenter.require(DisplayTarget::CountdownText) {
            error!(%err, "countdown values will not be shown");
        }

        StartSequencer {
            pars: pars.to_owned(),
            phase: Phase::InitialDelay { t: 0.0 },
            started: false,
        }
    }

    /// is_started returns true once the horses have been released.
    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_done(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }

    /// update advances the sequence by `dt`. Time left over at a phase boundary is carried into
    /// the next phase, so a single large step can pass several phases.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        dt: f64,
        race: &mut Race,
        arena: &mut Arena,
        rng: &mut R,
        presenter: &Presenter,
    ) {
        let mut phase = match self.phase {
            Phase::InitialDelay { t } => Phase::InitialDelay { t: t + dt },
            Phase::Counting { value, t } => Phase::Counting { value, t: t + dt },
            Phase::Go { t } => Phase::Go { t: t + dt },
            Phase::Done => Phase::Done,
        };

        self.phase = loop {
            phase = match phase {
                Phase::InitialDelay { t } if t >= self.pars.initial_delay => {
                    let t = t - self.pars.initial_delay;
                    if self.pars.countdown_from == 0 {
                        self.go(race, arena, rng, presenter);
                        Phase::Go { t }
                    } else {
                        Self::show_value(self.pars.countdown_from, presenter);
                        Phase::Counting {
                            value: self.pars.countdown_from,
                            t,
                        }
                    }
                }
                Phase::Counting { value, t } if t >= self.pars.countdown_interval => {
                    let t = t - self.pars.countdown_interval;
                    if value > 1 {
                        Self::show_value(value - 1, presenter);
                        Phase::Counting {
                            value: value - 1,
                            t,
                        }
                    } else {
                        self.go(race, arena, rng, presenter);
                        Phase::Go { t }
                    }
                }
                Phase::Go { t } if t >= self.pars.go_duration => {
                    presenter.display(
                        DisplayTarget::CountdownText,
                        DisplayUpdate::CountdownCleared,
                    );
                    Phase::Done
                }
                _ => break phase,
            };
        };
    }

    fn show_value(value: u32, presenter: &Presenter) {
        presenter.display(
            DisplayTarget::CountdownText,
            DisplayUpdate::Countdown(value.to_string()),
        );
        presenter.audio(AudioCue::CountdownBeep);
    }

    fn go<R: Rng + ?Sized>(
        &mut self,
        race: &mut Race,
        arena: &mut Arena,
        rng: &mut R,
        presenter: &Presenter,
    ) {
        if self.started {
            return;
        }
        self.started = true;

        presenter.display(
            DisplayTarget::CountdownText,
            DisplayUpdate::Countdown("GO!".to_owned()),
        );
        presenter.audio(AudioCue::RaceStart);
        presenter.audio(AudioCue::MusicStart);

        arena.remove_barrier();
        presenter.send(PresentationEvent::BarrierRemoved);

        for horse in race.horses_mut() {
            horse.start_moving(arena, rng);
        }
        race.start_timer();

        info!("go");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::arena::{ArenaPars, RigidBody};
    use crate::core::finish_sequence::FinishSequencePars;
    use crate::core::horse::{Horse, HorsePars};
    use crate::core::race::{RacePars, RaceState};
    use crate::core::scoreboard::ScoreStore;
    use crate::interfaces::presentation_interface::{DisplayBindings, RgbColor};
    use nalgebra::Vector2;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup() -> (Arena, Race) {
        let mut arena = Arena::new(&ArenaPars::default());
        let mut horses = Vec::new();
        for (i, name) in ["Bolt", "Comet"].iter().enumerate() {
            let pars = HorsePars::new(name, "red", [2.0, 5.0 + 5.0 * i as f64]);
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
            &ScoreStore::new(),
        );
        (arena, race)
    }

    #[test]
    fn countdown_then_go_then_cleared() {
        let (tx, rx) = flume::unbounded();
        let presenter = Presenter::new(Some(tx), DisplayBindings::default());
        let (mut arena, mut race) = setup();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        race.start_countdown(&presenter);
        let mut sequencer = StartSequencer::new(&StartPars::default(), &presenter);

        let mut t = 0.0;
        while !sequencer.is_done() {
            sequencer.update(0.02, &mut race, &mut arena, &mut rng, &presenter);
            if !sequencer.is_started() {
                assert!(race.horses().iter().all(|h| !h.can_move));
                assert!(arena.has_barrier());
            }
            t += 0.02;
            assert!(t < 10.0);
        }

        let shown: Vec<DisplayUpdate> = rx
            .try_iter()
            .filter_map(|ev| match ev {
                PresentationEvent::Display(u @ DisplayUpdate::Countdown(_))
                | PresentationEvent::Display(u @ DisplayUpdate::CountdownCleared) => Some(u),
                _ => None,
            })
            .collect();
        assert_eq!(
            shown,
            vec![
                DisplayUpdate::Countdown("3".to_owned()),
                DisplayUpdate::Countdown("2".to_owned()),
                DisplayUpdate::Countdown("1".to_owned()),
                DisplayUpdate::Countdown("GO!".to_owned()),
                DisplayUpdate::CountdownCleared,
            ]
        );

        assert_eq!(race.state(), RaceState::Racing);
        assert!(race.horses().iter().all(|h| h.can_move));
        assert!(!arena.has_barrier());
    }

    #[test]
    fn release_happens_once() {
        let (tx, rx) = flume::unbounded();
        let presenter = Presenter::new(Some(tx), DisplayBindings::default());
        let (mut arena, mut race) = setup();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        race.start_countdown(&presenter);
        let mut sequencer = StartSequencer::new(&StartPars::default(), &presenter);

        for _ in 0..1000 {
            sequencer.update(0.02, &mut race, &mut arena, &mut rng, &presenter);
        }

        let starts = rx
            .try_iter()
            .filter(|ev| *ev == PresentationEvent::Audio(AudioCue::RaceStart))
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn unbound_countdown_still_releases_horses() {
        let (tx, rx) = flume::unbounded();
        let presenter = Presenter::new(
            Some(tx),
            DisplayBindings {
                countdown_text: false,
                ..DisplayBindings::default()
            },
        );
        let (mut arena, mut race) = setup();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        race.start_countdown(&presenter);
        let mut sequencer = StartSequencer::new(&StartPars::default(), &presenter);

        let t_go = StartPars::default().time_to_go();
        sequencer.update(t_go, &mut race, &mut arena, &mut rng, &presenter);
        for _ in 0..4 {
            sequencer.update(1.0, &mut race, &mut arena, &mut rng, &presenter);
        }

        assert!(sequencer.is_started());
        assert_eq!(race.state(), RaceState::Racing);
        assert!(!rx
            .try_iter()
            .any(|ev| matches!(ev, PresentationEvent::Display(DisplayUpdate::Countdown(_)))));
    }

    #[test]
    fn coarse_steps_release_on_time() {
        let presenter = Presenter::headless();
        let (mut arena, mut race) = setup();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        race.start_countdown(&presenter);
        let mut sequencer = StartSequencer::new(&StartPars::default(), &presenter);

        // GO is due after 4.0 s, i.e. within the 11th step of 0.375 s (4.125 s)
        for _ in 0..10 {
            sequencer.update(0.375, &mut race, &mut arena, &mut rng, &presenter);
            assert!(!sequencer.is_started());
        }
        sequencer.update(0.375, &mut race, &mut arena, &mut rng, &presenter);
        assert!(sequencer.is_started());
        assert_eq!(race.state(), RaceState::Racing);

        // 0.125 s of the GO hold have already passed
        sequencer.update(0.3, &mut race, &mut arena, &mut rng, &presenter);
        assert!(!sequencer.is_done());
        sequencer.update(0.1, &mut race, &mut arena, &mut rng, &presenter);
        assert!(sequencer.is_done());
    }

    #[test]
    fn single_long_step_runs_whole_countdown() {
        let (tx, rx) = flume::unbounded();
        let presenter = Presenter::new(Some(tx), DisplayBindings::default());
        let (mut arena, mut race) = setup();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        race.start_countdown(&presenter);
        let mut sequencer = StartSequencer::new(&StartPars::default(), &presenter);

        sequencer.update(10.0, &mut race, &mut arena, &mut rng, &presenter);

        assert!(sequencer.is_done());
        assert_eq!(race.state(), RaceState::Racing);
        let beeps = rx
            .try_iter()
            .filter(|ev| *ev == PresentationEvent::Audio(AudioCue::CountdownBeep))
            .count();
        assert_eq!(beeps, 3);
    }
}
