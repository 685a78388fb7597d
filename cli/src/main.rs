use anyhow::Context;
use clap::Parser;
use derbysim::core::handle_race::{handle_race, RunOpts};
use derbysim::interfaces::presentation_interface::{
    AudioCue, DisplayUpdate, InputEvent, PresentationEvent, TimelineEvent,
};
use derbysim::post::race_result::{merge_scoreboards, SessionResult};
use derbysim::pre::read_sim_pars::{read_sim_pars, SimPars};
use derbysim::pre::sim_opts::SimOpts;
use rayon::prelude::*;
use std::io::BufRead;
use std::thread;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// TextPresenter renders presentation events as console lines. Progress events and race timer
/// updates within the same second are skipped.
#[derive(Debug, Default)]
struct TextPresenter {
    last_timer_line: Option<String>,
}

impl TextPresenter {
    fn render(&mut self, event: &PresentationEvent) -> Option<String> {
        match event {
            PresentationEvent::Display(update) => match update {
                DisplayUpdate::RaceTimer(text) => {
                    // only show full seconds, i.e. "mm:ss"
                    let line = text.get(..5).unwrap_or(text).to_owned();
                    if self.last_timer_line.as_ref() == Some(&line) {
                        None
                    } else {
                        self.last_timer_line = Some(line.to_owned());
                        Some(format!("[timer] {}", line))
                    }
                }
                DisplayUpdate::Countdown(text) => Some(format!("[countdown] {}", text)),
                DisplayUpdate::CountdownCleared => None,
                DisplayUpdate::RestartCountdown(secs) => {
                    if *secs % 10 == 0 || *secs <= 5 {
                        Some(format!("[restart] in {}s", secs))
                    } else {
                        None
                    }
                }
                DisplayUpdate::Scoreboard(text) => Some(format!("[scoreboard]\n{}", text)),
                DisplayUpdate::Winner(name) => Some(format!("[winner] {}", name)),
                DisplayUpdate::RestartPrompt(text) => Some(format!("[prompt] {}", text)),
            },
            PresentationEvent::Timeline(event) => match event {
                TimelineEvent::FadeStarted => Some("[finish] fade".to_owned()),
                TimelineEvent::PopupRevealed { winner, color } => Some(format!(
                    "[finish] popup for {} (#{:02x}{:02x}{:02x})",
                    winner, color.r, color.g, color.b
                )),
                TimelineEvent::PromptRevealed(text) => Some(format!("[finish] {}", text)),
                TimelineEvent::FadeProgress { .. } | TimelineEvent::PopupProgress { .. } => None,
            },
            PresentationEvent::Audio(cue) => match cue {
                AudioCue::WallImpact { .. } | AudioCue::HorseImpact { .. } => None,
                cue => Some(format!("[audio] {:?}", cue)),
            },
            PresentationEvent::BarrierRemoved => Some("[arena] barrier removed".to_owned()),
            PresentationEvent::WorldReloaded { race_no } => {
                self.last_timer_line = None;
                Some(format!("[arena] race {} set up", race_no))
            }
        }
    }
}

/// parse_input maps a console line to an input event.
fn parse_input(line: &str) -> InputEvent {
    match line.trim() {
        "r" | "R" => InputEvent::RestartRequest { full_reset: false },
        "reset" => InputEvent::RestartRequest { full_reset: true },
        _ => InputEvent::Interaction,
    }
}

/// session_seed derives the seed of the i-th headless session, wrapping at the end of the range.
fn session_seed(base: u64, i: u64) -> u64 {
    base.wrapping_add(i)
}

fn print_results(results: &[SessionResult], json: bool) -> anyhow::Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(results).context("Failed to serialize results!")?
        );
        return Ok(());
    }

    for result in results.iter() {
        result.print_results();
    }
    if results.len() > 1 {
        println!("RESULT: Scoreboard of all sessions");
        println!("{}", merge_scoreboards(results).render());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments
    let sim_opts: SimOpts = SimOpts::parse();

    let default_level = if sim_opts.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    anyhow::ensure!(
        sim_opts.frame_step > 0.0 && sim_opts.frame_step <= 1.0,
        "Frame step size must be in the range (0.0, 1.0]!"
    );
    anyhow::ensure!(
        sim_opts.realtime_factor > 0.0,
        "Real-time factor must be positive!"
    );

    // get simulation parameters
    let mut sim_pars = if let Some(parfile_path) = &sim_opts.parfile_path {
        info!("Reading simulation parameters from {:?}", parfile_path);
        read_sim_pars(parfile_path)?
    } else {
        info!("No parameter file provided, using the built-in four-horse race");
        SimPars::default()
    };
    if let Some(auto_restart_delay) = sim_opts.auto_restart_delay {
        sim_pars.race_pars.auto_restart_delay = auto_restart_delay;
    }
    sim_pars.validate()?;

    info!(
        horses = sim_pars.horse_pars_all.len(),
        races = sim_opts.races,
        timestep_size = sim_pars.race_pars.timestep_size,
        "Simulating"
    );

    let run_opts = |seed: u64| RunOpts {
        seed,
        no_races: sim_opts.races,
        frame_step: sim_opts.frame_step,
        max_race_time: sim_opts.max_race_time,
        realtime_factor: sim_opts.realtime_factor,
    };

    // EXECUTION -----------------------------------------------------------------------------------
    let results = if !sim_opts.live {
        info!("Running {} session(s) headless...", sim_opts.no_sim_runs);
        let t_start = Instant::now();

        let results = (0..sim_opts.no_sim_runs as u64)
            .into_par_iter()
            .map(|i| {
                let seed = session_seed(sim_opts.seed, i);
                handle_race(&sim_pars, &run_opts(seed), None, None)
            })
            .collect::<anyhow::Result<Vec<SessionResult>>>()?;

        info!("Execution time: {}ms", t_start.elapsed().as_millis());
        results
    } else {
        info!("Running live, enter \"r\" twice to restart or \"reset\" twice to reset");

        // channels between the simulation thread and the console
        let (tx, rx) = flume::unbounded();
        let (tx_input, rx_input) = flume::unbounded();

        let sim_pars_thread = sim_pars.clone();
        let run_opts_thread = run_opts(sim_opts.seed);
        let sim_thread = thread::spawn(move || {
            handle_race(&sim_pars_thread, &run_opts_thread, Some(tx), Some(&rx_input))
        });

        // stdin blocks, the thread is left behind when the simulation ends
        thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(_) => break,
                };
                if tx_input.send(parse_input(&line)).is_err() {
                    break;
                }
            }
        });

        // the loop ends once the simulation thread drops its sender
        let mut text_presenter = TextPresenter::default();
        for event in rx.iter() {
            if let Some(line) = text_presenter.render(&event) {
                println!("{}", line);
            }
        }

        let result = sim_thread
            .join()
            .map_err(|_| anyhow::anyhow!("Simulation thread panicked!"))??;
        vec![result]
    };

    // POST-PROCESSING -----------------------------------------------------------------------------
    print_results(&results, sim_opts.json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use derbysim::interfaces::presentation_interface::RgbColor;

    #[test]
    fn console_lines_map_to_input_events() {
        assert_eq!(
            parse_input("r\n"),
            InputEvent::RestartRequest { full_reset: false }
        );
        assert_eq!(
            parse_input(" reset "),
            InputEvent::RestartRequest { full_reset: true }
        );
        assert_eq!(parse_input("hello"), InputEvent::Interaction);
    }

    #[test]
    fn session_seeds_wrap_around() {
        assert_eq!(session_seed(42, 3), 45);
        assert_eq!(session_seed(u64::MAX, 0), u64::MAX);
        assert_eq!(session_seed(u64::MAX, 1), 0);
    }

    #[test]
    fn timer_is_printed_once_per_second() {
        let mut presenter = TextPresenter::default();
        let timer = |t: &str| PresentationEvent::Display(DisplayUpdate::RaceTimer(t.to_owned()));

        assert_eq!(
            presenter.render(&timer("00:01:050")),
            Some("[timer] 00:01".to_owned())
        );
        assert_eq!(presenter.render(&timer("00:01:100")), None);
        assert_eq!(
            presenter.render(&timer("00:02:000")),
            Some("[timer] 00:02".to_owned())
        );
    }

    #[test]
    fn popup_shows_winner_color() {
        let mut presenter = TextPresenter::default();
        let event = PresentationEvent::Timeline(TimelineEvent::PopupRevealed {
            winner: "Bolt".to_owned(),
            color: RgbColor {
                r: 255,
                g: 0,
                b: 16,
            },
        });

        assert_eq!(
            presenter.render(&event),
            Some("[finish] popup for Bolt (#ff0010)".to_owned())
        );
        assert_eq!(
            presenter.render(&PresentationEvent::Audio(AudioCue::WallImpact { pitch: 1.0 })),
            None
        );
    }
}
