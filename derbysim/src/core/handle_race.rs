use crate::core::race::RaceState;
use crate::core::session::RaceSession;
use crate::interfaces::presentation_interface::{InputEvent, PresentationEvent, Presenter};
use crate::post::race_result::SessionResult;
use crate::pre::read_sim_pars::SimPars;
use flume::{Receiver, Sender, TryRecvError};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// RunOpts bundles the options that control how a session is driven.
#[derive(Debug, Clone)]
pub struct RunOpts {
    pub seed: u64,
    pub no_races: u32,
    pub frame_step: f64,
    pub max_race_time: f64,
    pub realtime_factor: f64,
}

/// handle_race creates a session on the basis of the inserted parameters, simulates the requested
/// number of races and returns the results for post-processing. Without a sender the session runs
/// as fast as possible, otherwise it runs in real time and presentation events are sent to the
/// receiving side.
pub fn handle_race(
    sim_pars: &SimPars,
    run_opts: &RunOpts,
    tx: Option<Sender<PresentationEvent>>,
    rx_input: Option<&Receiver<InputEvent>>,
) -> anyhow::Result<SessionResult> {
    // check if sender was inserted -> in that case use real-time simulation
    let sim_realtime = tx.is_some();
    let presenter = Presenter::new(tx, sim_pars.bindings);
    let mut session = RaceSession::new(sim_pars, run_opts.seed, presenter)?;

    if !sim_realtime {
        let mut t_session_update_print = 0.0;

        // aborted races count as run, otherwise a race that never finishes blocks the session
        while session.results().len() as u32 + session.aborted_races() < run_opts.no_races {
            session.frame(run_opts.frame_step)?;

            enforce_max_race_time(&mut session, run_opts.max_race_time)?;

            if session.t_session() > t_session_update_print + 9.9999 {
                debug!(
                    seed = run_opts.seed,
                    race_no = session.race_no(),
                    t_session = session.t_session(),
                    "simulating"
                );
                t_session_update_print = session.t_session();
            }
        }
    } else {
        let mut t_last_frame = Instant::now();
        let mut input_open = rx_input.is_some();

        // keep going until the last race has been restarted so that its finish sequence is shown
        while session.race_no() <= run_opts.no_races {
            let t_start = Instant::now();

            if let Some(rx) = rx_input.filter(|_| input_open) {
                loop {
                    match rx.try_recv() {
                        Ok(event) => session.handle_input(event),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            debug!("input channel closed");
                            input_open = false;
                            break;
                        }
                    }
                }
            }

            // frame time is measured wall clock time, scaled by the real-time factor
            let dt = t_last_frame.elapsed().as_secs_f64() * run_opts.realtime_factor;
            t_last_frame = Instant::now();
            session.frame(dt)?;

            enforce_max_race_time(&mut session, run_opts.max_race_time)?;

            // sleep until frame step is finished in real-time as well (calculation in ms)
            let t_sleep = (run_opts.frame_step * 1000.0 / run_opts.realtime_factor) as i64
                - t_start.elapsed().as_millis() as i64;

            if t_sleep > 0 {
                sleep(Duration::from_millis(t_sleep as u64));
            } else {
                warn!("could not keep up with real-time");
            }
        }
    }

    let result = SessionResult {
        seed: run_opts.seed,
        races: session.results().to_vec(),
        aborted_races: session.aborted_races(),
        scoreboard: session.scoreboard().to_owned(),
    };
    info!(
        seed = run_opts.seed,
        races = result.races.len(),
        aborted = result.aborted_races,
        "session finished"
    );

    Ok(result)
}

/// enforce_max_race_time aborts the current race if it runs longer than allowed.
fn enforce_max_race_time(session: &mut RaceSession, max_race_time: f64) -> anyhow::Result<()> {
    if session.race().state() == RaceState::Racing && session.race().cur_racetime > max_race_time
    {
        session.abort_race()?;
    }
    Ok(())
}
