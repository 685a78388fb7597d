use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    name = "derby",
    about = "A time-stepped horse race simulator written in Rust"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug logging
    #[clap(short, long)]
    pub debug: bool,

    /// Run a single session in real time, print presentation events and read restart requests
    /// from stdin ("r" restarts, "reset" also clears the scoreboard)
    #[clap(short, long)]
    pub live: bool,

    /// Print the session results as JSON
    #[clap(short, long)]
    pub json: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set number of independent sessions (only for headless mode, ignored in live mode)
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set number of races per session
    #[clap(short = 'c', long, default_value = "3")]
    pub races: u32,

    /// Set path to the simulation parameter file (OPTIONAL: if not set, uses the built-in
    /// four-horse race)
    #[clap(short, long)]
    pub parfile_path: Option<PathBuf>,

    /// Set seed of the first session, further sessions use the following seeds
    #[clap(short, long, default_value = "42")]
    pub seed: u64,

    /// Set real-time factor (only relevant in live mode)
    #[clap(short, long, default_value = "1.0")]
    pub realtime_factor: f64,

    /// Set frame step size in seconds, should be in the range [0.001, 0.1]
    #[clap(short, long, default_value = "0.0166667")]
    pub frame_step: f64,

    /// Set maximum simulated race time in seconds after which a race is aborted
    #[clap(short, long, default_value = "600.0")]
    pub max_race_time: f64,

    /// Override the idle time in seconds after which a finished race restarts by itself
    #[clap(short, long)]
    pub auto_restart_delay: Option<f64>,
}
