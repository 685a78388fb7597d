use crate::core::arena::{Arena, Contact, RigidBody};
use crate::core::horse::{FinishReport, Horse};
use crate::core::race::{Race, RaceState};
use crate::core::scoreboard::{ScoreStore, Scoreboard};
use crate::core::start_sequencer::StartSequencer;
use crate::interfaces::presentation_interface::{InputEvent, PresentationEvent, Presenter};
use crate::post::race_result::RaceResult;
use crate::pre::read_sim_pars::{parse_color, SimPars};
use nalgebra::Vector2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

/// RaceSession is the single cooperative scheduler of the simulation. It owns the world of the
/// current race (arena, horses, controller, start sequencer) as well as everything that outlives
/// a race: the random source, the score store and the results of completed races.
#[derive(Debug)]
pub struct RaceSession {
    sim_pars: SimPars,
    presenter: Presenter,
    rng: ChaCha8Rng,
    store: ScoreStore,

    // world of the current race
    arena: Arena,
    race: Race,
    sequencer: StartSequencer,

    // scheduler state
    timestep_size: f64,
    t_session: f64,
    t_physics_acc: f64,
    race_no: u32,
    aborted_races: u32,
    results: Vec<RaceResult>,
}

impl RaceSession {
    /// Creates a session and sets up the first race. The parameters are validated beforehand.
    pub fn new(sim_pars: &SimPars, seed: u64, presenter: Presenter) -> anyhow::Result<RaceSession> {
        sim_pars.validate()?;

        let store = ScoreStore::new();
        let (arena, race, sequencer) = build_world(sim_pars, &store, &presenter)?;

        let mut session = RaceSession {
            sim_pars: sim_pars.to_owned(),
            presenter,
            rng: ChaCha8Rng::seed_from_u64(seed),
            store,
            arena,
            race,
            sequencer,
            timestep_size: sim_pars.race_pars.timestep_size,
            t_session: 0.0,
            t_physics_acc: 0.0,
            race_no: 1,
            aborted_races: 0,
            results: Vec::new(),
        };
        session.race.start_countdown(&session.presenter);
        info!(seed, horses = sim_pars.horse_pars_all.len(), "session created");

        Ok(session)
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHODS --------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// frame advances the session by a variable frame step. Physics runs in as many fixed steps
    /// as fit into the accumulated time, then the timed sequences and the controller advance by
    /// the frame step.
    pub fn frame(&mut self, dt: f64) -> anyhow::Result<()> {
        self.t_session += dt;
        self.t_physics_acc += dt;

        while self.t_physics_acc >= self.timestep_size - 1e-9 {
            self.fixed_step(self.timestep_size);
            self.t_physics_acc -= self.timestep_size;
        }

        self.sequencer.update(
            dt,
            &mut self.race,
            &mut self.arena,
            &mut self.rng,
            &self.presenter,
        );
        self.race.update(dt, &self.presenter);

        if self.race.state() == RaceState::RestartPending {
            self.reload()?;
        }

        Ok(())
    }

    fn fixed_step(&mut self, dt: f64) {
        for horse in self.race.horses_mut() {
            horse.tick(dt, &mut self.arena, &mut self.rng);
        }

        let contacts = self.arena.step(dt);

        // finish reports are handed to the controller after all contacts of the step
        let mut reports: Vec<FinishReport> = Vec::new();

        for contact in contacts {
            match contact {
                Contact::Wall { body, normal } => {
                    if let Some(idx) = self.race.horse_by_body(body) {
                        let cue = self.race.horse_mut(idx).on_wall_contact(
                            normal,
                            self.t_session,
                            &mut self.arena,
                            &mut self.rng,
                        );
                        if let Some(cue) = cue {
                            self.presenter.audio(cue);
                        }
                    }
                }
                Contact::Agent { body, other } => {
                    if let Some(idx) = self.race.horse_by_body(body) {
                        let cue = self.race.horse_mut(idx).on_agent_contact(
                            other,
                            self.t_session,
                            &mut self.arena,
                            &mut self.rng,
                        );
                        if let Some(cue) = cue {
                            self.presenter.audio(cue);
                        }
                    }
                }
                Contact::FinishBoundary { body } => {
                    if let Some(idx) = self.race.horse_by_body(body) {
                        if let Some(report) = self.race.horse_mut(idx).on_finish_trigger() {
                            reports.push(report);
                        }
                    }
                }
            }
        }

        for report in reports {
            if self
                .race
                .report_finish(report.horse, &mut self.arena, &self.presenter)
            {
                self.record_result();
            }
        }
    }

    /// handle_input forwards input events to the controller.
    pub fn handle_input(&mut self, event: InputEvent) {
        debug!(?event, "input");
        match event {
            InputEvent::RestartRequest { full_reset } => {
                self.race.register_interaction();
                self.race.request_restart(full_reset, &self.presenter);
            }
            InputEvent::Interaction => self.race.register_interaction(),
        }
    }

    /// abort_race throws away the current race without a result and sets up the next one.
    pub fn abort_race(&mut self) -> anyhow::Result<()> {
        warn!(
            race_no = self.race_no,
            race_time = self.race.cur_racetime,
            "aborting race"
        );
        self.aborted_races += 1;
        self.reload()
    }

    // ---------------------------------------------------------------------------------------------
    // METHODS (HELPERS) ---------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    fn record_result(&mut self) {
        if let Some(winner) = self.race.winning_horse() {
            self.results.push(RaceResult {
                race_no: self.race_no,
                winner: winner.name.to_owned(),
                race_time: self.race.cur_racetime,
                scoreboard: self.race.scoreboard().entries().to_vec(),
            });
        }
    }

    /// reload persists the scoreboard and replaces the world by a fresh one that adopts it.
    fn reload(&mut self) -> anyhow::Result<()> {
        self.store.persist(self.race.scoreboard());

        let (arena, race, sequencer) = build_world(&self.sim_pars, &self.store, &self.presenter)?;
        self.arena = arena;
        self.race = race;
        self.sequencer = sequencer;
        self.t_physics_acc = 0.0;
        self.race_no += 1;

        self.presenter.send(PresentationEvent::WorldReloaded {
            race_no: self.race_no,
        });
        self.race.start_countdown(&self.presenter);
        info!(race_no = self.race_no, "world reloaded");

        Ok(())
    }

    pub fn race(&self) -> &Race {
        &self.race
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    #[cfg(test)]
    pub(crate) fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    pub fn sequencer(&self) -> &StartSequencer {
        &self.sequencer
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        self.race.scoreboard()
    }

    pub fn results(&self) -> &[RaceResult] {
        &self.results
    }

    pub fn race_no(&self) -> u32 {
        self.race_no
    }

    pub fn aborted_races(&self) -> u32 {
        self.aborted_races
    }

    pub fn t_session(&self) -> f64 {
        self.t_session
    }
}

/// build_world spawns the arena bodies and horses of a race and creates its controller.
fn build_world(
    sim_pars: &SimPars,
    store: &ScoreStore,
    presenter: &Presenter,
) -> anyhow::Result<(Arena, Race, StartSequencer)> {
    let mut arena = Arena::new(&sim_pars.arena_pars);
    let mut horses = Vec::with_capacity(sim_pars.horse_pars_all.len());

    for (id, horse_pars) in sim_pars.horse_pars_all.iter().enumerate() {
        let color = parse_color(&horse_pars.name, &horse_pars.color)?;
        let body = arena.spawn(RigidBody::new(
            Vector2::new(horse_pars.start_pos[0], horse_pars.start_pos[1]),
            horse_pars.radius,
            horse_pars.mass,
        ));
        horses.push(Horse::new(id, horse_pars, color, body));
    }

    let race = Race::new(&sim_pars.race_pars, &sim_pars.finish_pars, horses, store);
    let sequencer = StartSequencer::new(&sim_pars.start_pars, presenter);

    Ok((arena, race, sequencer))
}
