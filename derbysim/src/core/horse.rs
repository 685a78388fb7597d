use crate::core::arena::{Arena, BodyId, ForceMode};
use crate::interfaces::presentation_interface::{AudioCue, RgbColor};
use nalgebra::Vector2;
use rand::Rng;
use rand_distr::{Distribution, UnitCircle};
use serde::Deserialize;

/// Index of a horse inside the race roster.
pub type HorseId = usize;

/// * `name` - Horse name, unique within a race
/// * `color` - CSS color string of the horse, e.g. "#8b4513" or "saddlebrown"
/// * `start_pos` - (m) Start position inside the arena
/// * `radius` - (m) Collision radius
/// * `mass` - (kg) Mass
/// * `move_force` - (N*s) Magnitude of a random steering impulse
/// * `torque_force` - (N*m*s) Maximum magnitude of a random torque impulse
/// * `target_speed` - (m/s) Speed the horse tries to hold
/// * `change_direction_interval` - (s) Time between two random steering impulses
/// * `speed_maintenance_force` - (N) Forward force applied while slower than the target speed
/// * `min_pitch`, `max_pitch` - Pitch range of the impact sounds
/// * `impact_sound_duration` - (s) Length of an impact sound, no new impact sound starts before
/// the previous one has ended
#[derive(Debug, Deserialize, Clone)]
pub struct HorsePars {
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
    pub start_pos: [f64; 2],
    #[serde(default = "default_radius")]
    pub radius: f64,
    #[serde(default = "default_mass")]
    pub mass: f64,
    #[serde(default = "default_move_force")]
    pub move_force: f64,
    #[serde(default = "default_torque_force")]
    pub torque_force: f64,
    #[serde(default = "default_target_speed")]
    pub target_speed: f64,
    #[serde(default = "default_change_direction_interval")]
    pub change_direction_interval: f64,
    #[serde(default = "default_speed_maintenance_force")]
    pub speed_maintenance_force: f64,
    #[serde(default = "default_min_pitch")]
    pub min_pitch: f64,
    #[serde(default = "default_max_pitch")]
    pub max_pitch: f64,
    #[serde(default = "default_impact_sound_duration")]
    pub impact_sound_duration: f64,
}

fn default_color() -> String {
    "#8b4513".to_owned()
}

fn default_radius() -> f64 {
    0.5
}

fn default_mass() -> f64 {
    1.0
}

fn default_move_force() -> f64 {
    5.0
}

fn default_torque_force() -> f64 {
    2.0
}

fn default_target_speed() -> f64 {
    8.0
}

fn default_change_direction_interval() -> f64 {
    2.0
}

fn default_speed_maintenance_force() -> f64 {
    0.5
}

fn default_min_pitch() -> f64 {
    0.9
}

fn default_max_pitch() -> f64 {
    1.1
}

fn default_impact_sound_duration() -> f64 {
    0.3
}

impl HorsePars {
    /// Parameters with default movement settings for a horse at the given start position.
    pub fn new(name: &str, color: &str, start_pos: [f64; 2]) -> HorsePars {
        HorsePars {
            name: name.to_owned(),
            color: color.to_owned(),
            start_pos,
            radius: default_radius(),
            mass: default_mass(),
            move_force: default_move_force(),
            torque_force: default_torque_force(),
            target_speed: default_target_speed(),
            change_direction_interval: default_change_direction_interval(),
            speed_maintenance_force: default_speed_maintenance_force(),
            min_pitch: default_min_pitch(),
            max_pitch: default_max_pitch(),
            impact_sound_duration: default_impact_sound_duration(),
        }
    }
}

/// FinishReport is raised by a horse that crossed the finish boundary. It is handed to the race
/// controller after all contacts of the current physics step have been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishReport {
    pub horse: HorseId,
}

#[derive(Debug)]
pub struct Horse {
    pub id: HorseId,
    pub name: String,
    pub color: RgbColor,
    pub body: BodyId,
    move_force: f64,
    torque_force: f64,
    target_speed: f64,
    change_direction_interval: f64,
    speed_maintenance_force: f64,
    min_pitch: f64,
    max_pitch: f64,
    impact_sound_duration: f64,
    pub can_move: bool,
    has_won: bool,
    direction_timer: f64,
    sound_busy_until: f64,
}

impl Horse {
    pub fn new(id: HorseId, horse_pars: &HorsePars, color: RgbColor, body: BodyId) -> Horse {
        Horse {
            id,
            name: horse_pars.name.to_owned(),
            color,
            body,
            move_force: horse_pars.move_force,
            torque_force: horse_pars.torque_force,
            target_speed: horse_pars.target_speed,
            change_direction_interval: horse_pars.change_direction_interval,
            speed_maintenance_force: horse_pars.speed_maintenance_force,
            min_pitch: horse_pars.min_pitch,
            max_pitch: horse_pars.max_pitch,
            impact_sound_duration: horse_pars.impact_sound_duration,
            can_move: false,
            has_won: false,
            direction_timer: 0.0,
            sound_busy_until: f64::NEG_INFINITY,
        }
    }

    pub fn has_won(&self) -> bool {
        self.has_won
    }

    pub fn target_speed(&self) -> f64 {
        self.target_speed
    }

    /// start_moving releases the horse and gives it a first random push.
    pub fn start_moving<R: Rng + ?Sized>(&mut self, arena: &mut Arena, rng: &mut R) {
        self.can_move = true;
        self.apply_random_force(arena, rng);
    }

    /// stop freezes the horse in place for the rest of the race.
    pub fn stop(&mut self, arena: &mut Arena) {
        self.can_move = false;
        arena.body_mut(self.body).halt();
    }

    /// tick advances the steering timer and holds the speed band. It must run once per physics
    /// step, before the arena integrates.
    pub fn tick<R: Rng + ?Sized>(&mut self, dt: f64, arena: &mut Arena, rng: &mut R) {
        if !self.can_move || self.has_won {
            return;
        }

        self.direction_timer += dt;
        if self.direction_timer >= self.change_direction_interval {
            self.apply_random_force(arena, rng);
            self.direction_timer = 0.0;
        }

        self.maintain_speed(arena);
    }

    fn apply_random_force<R: Rng + ?Sized>(&self, arena: &mut Arena, rng: &mut R) {
        let [x, y]: [f64; 2] = UnitCircle.sample(rng);
        let torque = rng.gen_range(-1.0..=1.0) * self.torque_force;

        let body = arena.body_mut(self.body);
        body.add_force(Vector2::new(x, y) * self.move_force, ForceMode::Impulse);
        body.add_torque(torque, ForceMode::Impulse);
    }

    fn maintain_speed(&self, arena: &mut Arena) {
        let body = arena.body_mut(self.body);
        let speed = body.speed();

        if speed < self.target_speed {
            if speed > f64::EPSILON {
                let dir = body.velocity / speed;
                body.add_force(dir * self.speed_maintenance_force, ForceMode::Force);
            }
        } else if speed > self.target_speed * 1.1 {
            body.velocity *= self.target_speed / speed;
        }
    }

    /// on_wall_contact bounces the horse off a wall. normal must point away from the wall.
    pub fn on_wall_contact<R: Rng + ?Sized>(
        &mut self,
        normal: Vector2<f64>,
        now: f64,
        arena: &mut Arena,
        rng: &mut R,
    ) -> Option<AudioCue> {
        if !self.can_move {
            return None;
        }

        let body = arena.body_mut(self.body);
        let approach = body.velocity.dot(&normal);

        // a horse that already moves away from the wall keeps its velocity
        if approach >= 0.0 {
            return None;
        }

        let speed = body.speed();
        let reflected = body.velocity - 2.0 * approach * normal;
        body.velocity = if speed > 1.0 {
            reflected / speed * self.target_speed
        } else {
            reflected
        };

        self.try_impact_sound(now, rng)
            .map(|pitch| AudioCue::WallImpact { pitch })
    }

    /// on_agent_contact pushes this horse and the other one apart.
    pub fn on_agent_contact<R: Rng + ?Sized>(
        &mut self,
        other: BodyId,
        now: f64,
        arena: &mut Arena,
        rng: &mut R,
    ) -> Option<AudioCue> {
        if !self.can_move {
            return None;
        }

        let delta = arena.body(self.body).position - arena.body(other).position;
        let away = if delta.norm() > f64::EPSILON {
            delta.normalize()
        } else {
            Vector2::zeros()
        };
        let impulse = away * self.move_force * 1.5;

        arena.body_mut(self.body).add_force(impulse, ForceMode::Impulse);
        arena.body_mut(other).add_force(-impulse, ForceMode::Impulse);

        self.try_impact_sound(now, rng)
            .map(|pitch| AudioCue::HorseImpact { pitch })
    }

    /// on_finish_trigger latches the win flag. It returns a report the first time it fires for a
    /// moving horse and None afterwards.
    pub fn on_finish_trigger(&mut self) -> Option<FinishReport> {
        if self.has_won || !self.can_move {
            return None;
        }

        self.has_won = true;
        Some(FinishReport { horse: self.id })
    }

    fn try_impact_sound<R: Rng + ?Sized>(&mut self, now: f64, rng: &mut R) -> Option<f64> {
        if now < self.sound_busy_until {
            return None;
        }

        self.sound_busy_until = now + self.impact_sound_duration;
        Some(if self.max_pitch > self.min_pitch {
            rng.gen_range(self.min_pitch..=self.max_pitch)
        } else {
            self.min_pitch
        })
    }
}
