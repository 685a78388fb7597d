use crate::core::arena::ArenaPars;
use crate::core::finish_sequence::FinishSequencePars;
use crate::core::horse::HorsePars;
use crate::core::race::RacePars;
use crate::core::start_sequencer::StartPars;
use crate::interfaces::presentation_interface::{DisplayBindings, RgbColor};
use anyhow::Context;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::Path;
use thiserror::Error;

/// ParsError describes parameter sets that cannot be simulated.
#[derive(Debug, Error, PartialEq)]
pub enum ParsError {
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("at least one horse is required")]
    EmptyRoster,
    #[error("horse name {0:?} is used more than once")]
    DuplicateHorse(String),
    #[error("start position of horse {0:?} is outside the arena or behind the barrier")]
    StartOutsideArena(String),
    #[error("finish zone [{0}, {1}] is not inside the arena")]
    FinishZoneOutsideArena(f64, f64),
    #[error("color {color:?} of horse {horse:?} could not be parsed")]
    InvalidColor { horse: String, color: String },
    #[error("pitch range of horse {0:?} is invalid")]
    InvalidPitchRange(String),
}

/// SimPars is used to store all other parameter structs.
#[derive(Debug, Deserialize, Clone)]
pub struct SimPars {
    #[serde(default)]
    pub race_pars: RacePars,
    #[serde(default)]
    pub start_pars: StartPars,
    #[serde(default)]
    pub finish_pars: FinishSequencePars,
    #[serde(default)]
    pub arena_pars: ArenaPars,
    #[serde(default)]
    pub bindings: DisplayBindings,
    #[serde(default = "default_horse_pars_all")]
    pub horse_pars_all: Vec<HorsePars>,
}

fn default_horse_pars_all() -> Vec<HorsePars> {
    vec![
        HorsePars::new("Bolt", "#d62728", [2.0, 4.0]),
        HorsePars::new("Comet", "#1f77b4", [2.0, 8.0]),
        HorsePars::new("Dash", "#2ca02c", [2.0, 12.0]),
        HorsePars::new("Blaze", "#ff7f0e", [2.0, 16.0]),
    ]
}

impl Default for SimPars {
    fn default() -> Self {
        SimPars {
            race_pars: RacePars::default(),
            start_pars: StartPars::default(),
            finish_pars: FinishSequencePars::default(),
            arena_pars: ArenaPars::default(),
            bindings: DisplayBindings::default(),
            horse_pars_all: default_horse_pars_all(),
        }
    }
}

impl SimPars {
    /// validate checks the parameters for consistency before a session is set up.
    pub fn validate(&self) -> Result<(), ParsError> {
        let rp = &self.race_pars;
        let sp = &self.start_pars;
        let fp = &self.finish_pars;
        let ap = &self.arena_pars;

        check_positive("timestep_size", rp.timestep_size)?;
        check_positive("auto_restart_delay", rp.auto_restart_delay)?;
        check_positive("confirm_window", rp.confirm_window)?;
        check_non_negative("countdown_duration", rp.countdown_duration)?;
        check_non_negative("initial_delay", sp.initial_delay)?;
        check_positive("countdown_interval", sp.countdown_interval)?;
        check_non_negative("go_duration", sp.go_duration)?;
        check_non_negative("fade_duration", fp.fade_duration)?;
        check_non_negative("popup_delay", fp.popup_delay)?;
        check_non_negative("popup_animation_duration", fp.popup_animation_duration)?;
        check_non_negative("prompt_delay", fp.prompt_delay)?;
        check_positive("width", ap.width)?;
        check_positive("height", ap.height)?;

        let [finish_min, finish_max] = ap.finish_zone;
        if !(0.0 <= finish_min && finish_min < finish_max && finish_max <= ap.width) {
            return Err(ParsError::FinishZoneOutsideArena(finish_min, finish_max));
        }

        if self.horse_pars_all.is_empty() {
            return Err(ParsError::EmptyRoster);
        }

        let mut names = HashSet::new();
        for horse_pars in self.horse_pars_all.iter() {
            if !names.insert(horse_pars.name.as_str()) {
                return Err(ParsError::DuplicateHorse(horse_pars.name.to_owned()));
            }

            check_positive("radius", horse_pars.radius)?;
            check_positive("mass", horse_pars.mass)?;
            check_positive("target_speed", horse_pars.target_speed)?;
            check_positive("change_direction_interval", horse_pars.change_direction_interval)?;
            check_positive("move_force", horse_pars.move_force)?;
            check_non_negative("torque_force", horse_pars.torque_force)?;
            check_non_negative("speed_maintenance_force", horse_pars.speed_maintenance_force)?;
            check_non_negative("impact_sound_duration", horse_pars.impact_sound_duration)?;

            let [x, y] = horse_pars.start_pos;
            let x_max = ap.barrier_x.unwrap_or(ap.width);
            if x < horse_pars.radius
                || x > x_max - horse_pars.radius
                || y < horse_pars.radius
                || y > ap.height - horse_pars.radius
            {
                return Err(ParsError::StartOutsideArena(horse_pars.name.to_owned()));
            }

            if horse_pars.min_pitch <= 0.0 || horse_pars.max_pitch < horse_pars.min_pitch {
                return Err(ParsError::InvalidPitchRange(horse_pars.name.to_owned()));
            }

            parse_color(&horse_pars.name, &horse_pars.color)?;
        }

        Ok(())
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ParsError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ParsError::NonPositive { name, value })
    }
}

fn check_non_negative(name: &'static str, value: f64) -> Result<(), ParsError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ParsError::Negative { name, value })
    }
}

/// parse_color converts a CSS color string (e.g. `#8b4513` or `red`) of a horse into RGB.
pub fn parse_color(horse: &str, color: &str) -> Result<RgbColor, ParsError> {
    let tmp_color = color
        .parse::<css_color_parser::Color>()
        .map_err(|_| ParsError::InvalidColor {
            horse: horse.to_owned(),
            color: color.to_owned(),
        })?;

    Ok(RgbColor {
        r: tmp_color.r,
        g: tmp_color.g,
        b: tmp_color.b,
    })
}

/// read_sim_pars reads the JSON file and decodes the JSON string into the simulation parameters
/// struct.
pub fn read_sim_pars(filepath: &Path) -> anyhow::Result<SimPars> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open parameter file {}!",
            filepath.display()
        ))?;
    let pars: SimPars = serde_json::from_reader(&fh).context(format!(
        "Failed to parse parameter file {}!",
        filepath.display()
    ))?;
    pars.validate().context(format!(
        "Invalid parameters in {}!",
        filepath.display()
    ))?;
    Ok(pars)
}
