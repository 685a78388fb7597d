use nalgebra::Vector2;
use serde::Deserialize;

/// Index of a rigid body inside the arena.
pub type BodyId = usize;

/// * `width` - (m) Arena extent in x direction, the arena spans [0, width]
/// * `height` - (m) Arena extent in y direction, the arena spans [0, height]
/// * `barrier_x` - (m) Position of the start barrier (bodies must stay at x <= barrier_x until it
/// is removed), None if there is no barrier
/// * `finish_zone` - (m) [x_min, x_max] of the finish zone, which spans the full arena height
/// * `linear_drag` - (1/s) Linear drag coefficient of all bodies
/// * `angular_drag` - (1/s) Angular drag coefficient of all bodies
#[derive(Debug, Deserialize, Clone)]
pub struct ArenaPars {
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    #[serde(default = "default_barrier_x")]
    pub barrier_x: Option<f64>,
    #[serde(default = "default_finish_zone")]
    pub finish_zone: [f64; 2],
    #[serde(default = "default_drag")]
    pub linear_drag: f64,
    #[serde(default = "default_drag")]
    pub angular_drag: f64,
}

fn default_width() -> f64 {
    40.0
}

fn default_height() -> f64 {
    20.0
}

fn default_barrier_x() -> Option<f64> {
    Some(4.0)
}

fn default_finish_zone() -> [f64; 2] {
    [36.0, 40.0]
}

fn default_drag() -> f64 {
    0.05
}

impl Default for ArenaPars {
    fn default() -> Self {
        ArenaPars {
            width: default_width(),
            height: default_height(),
            barrier_x: default_barrier_x(),
            finish_zone: default_finish_zone(),
            linear_drag: default_drag(),
            angular_drag: default_drag(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceMode {
    /// Continuous force, integrated over the next step
    Force,
    /// Instantaneous change of momentum
    Impulse,
}

#[derive(Debug, Clone)]
pub struct RigidBody {
    pub position: Vector2<f64>,
    pub velocity: Vector2<f64>,
    pub angle: f64,
    pub angular_velocity: f64,
    pub radius: f64,
    mass: f64,
    inertia: f64,
    force: Vector2<f64>,
    torque: f64,
}

impl RigidBody {
    /// Creates a solid disc at rest.
    pub fn new(position: Vector2<f64>, radius: f64, mass: f64) -> RigidBody {
        RigidBody {
            position,
            velocity: Vector2::zeros(),
            angle: 0.0,
            angular_velocity: 0.0,
            radius,
            mass,
            inertia: 0.5 * mass * radius * radius,
            force: Vector2::zeros(),
            torque: 0.0,
        }
    }

    pub fn add_force(&mut self, force: Vector2<f64>, mode: ForceMode) {
        match mode {
            ForceMode::Force => self.force += force,
            ForceMode::Impulse => self.velocity += force / self.mass,
        }
    }

    pub fn add_torque(&mut self, torque: f64, mode: ForceMode) {
        match mode {
            ForceMode::Force => self.torque += torque,
            ForceMode::Impulse => self.angular_velocity += torque / self.inertia,
        }
    }

    /// Stops all motion and discards pending forces.
    pub fn halt(&mut self) {
        self.velocity = Vector2::zeros();
        self.angular_velocity = 0.0;
        self.force = Vector2::zeros();
        self.torque = 0.0;
    }

    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }
}

/// A wall is the boundary of the half plane normal * p >= offset. The normal points into the
/// arena.
#[derive(Debug, Clone, Copy)]
struct Wall {
    normal: Vector2<f64>,
    offset: f64,
}

impl Wall {
    fn penetration(&self, body: &RigidBody) -> f64 {
        self.offset - (self.normal.dot(&body.position) - body.radius)
    }
}

/// Contact is the closed set of collision and trigger events the arena reports per step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Contact {
    /// Body touched a wall, normal points away from the wall
    Wall { body: BodyId, normal: Vector2<f64> },
    /// Body touched another body (reported once for each of both participants)
    Agent { body: BodyId, other: BodyId },
    /// Body entered the finish zone
    FinishBoundary { body: BodyId },
}

/// Arena is a minimal 2D rigid body world: discs inside a walled rectangle with an optional start
/// barrier and a finish trigger zone.
#[derive(Debug)]
pub struct Arena {
    pub width: f64,
    pub height: f64,
    linear_drag: f64,
    angular_drag: f64,
    walls: Vec<Wall>,
    barrier: Option<Wall>,
    finish_min: Vector2<f64>,
    finish_max: Vector2<f64>,
    bodies: Vec<RigidBody>,
    in_finish: Vec<bool>,
}

impl Arena {
    pub fn new(arena_pars: &ArenaPars) -> Arena {
        let walls = vec![
            Wall {
                normal: Vector2::new(1.0, 0.0),
                offset: 0.0,
            },
            Wall {
                normal: Vector2::new(-1.0, 0.0),
                offset: -arena_pars.width,
            },
            Wall {
                normal: Vector2::new(0.0, 1.0),
                offset: 0.0,
            },
            Wall {
                normal: Vector2::new(0.0, -1.0),
                offset: -arena_pars.height,
            },
        ];

        Arena {
            width: arena_pars.width,
            height: arena_pars.height,
            linear_drag: arena_pars.linear_drag,
            angular_drag: arena_pars.angular_drag,
            walls,
            barrier: arena_pars.barrier_x.map(|x| Wall {
                normal: Vector2::new(-1.0, 0.0),
                offset: -x,
            }),
            finish_min: Vector2::new(arena_pars.finish_zone[0], 0.0),
            finish_max: Vector2::new(arena_pars.finish_zone[1], arena_pars.height),
            bodies: Vec::new(),
            in_finish: Vec::new(),
        }
    }

    pub fn spawn(&mut self, body: RigidBody) -> BodyId {
        self.in_finish.push(self.in_finish_zone(&body));
        self.bodies.push(body);
        self.bodies.len() - 1
    }

    pub fn body(&self, id: BodyId) -> &RigidBody {
        &self.bodies[id]
    }

    pub fn body_mut(&mut self, id: BodyId) -> &mut RigidBody {
        &mut self.bodies[id]
    }

    pub fn bodies(&self) -> &[RigidBody] {
        &self.bodies
    }

    pub fn has_barrier(&self) -> bool {
        self.barrier.is_some()
    }

    pub fn remove_barrier(&mut self) {
        self.barrier = None;
    }

    fn in_finish_zone(&self, body: &RigidBody) -> bool {
        let closest = Vector2::new(
            body.position.x.clamp(self.finish_min.x, self.finish_max.x),
            body.position.y.clamp(self.finish_min.y, self.finish_max.y),
        );
        (body.position - closest).norm() < body.radius
    }

    /// step integrates all bodies by dt and resolves overlaps. Contacts are returned in body
    /// order: agent contacts first, then wall contacts, then finish triggers.
    pub fn step(&mut self, dt: f64) -> Vec<Contact> {
        for body in self.bodies.iter_mut() {
            body.velocity += body.force / body.mass * dt;
            body.angular_velocity += body.torque / body.inertia * dt;
            body.velocity *= 1.0 / (1.0 + dt * self.linear_drag);
            body.angular_velocity *= 1.0 / (1.0 + dt * self.angular_drag);
            body.position += body.velocity * dt;
            body.angle += body.angular_velocity * dt;
            body.force = Vector2::zeros();
            body.torque = 0.0;
        }

        let mut contacts = Vec::new();

        // separate overlapping discs, each one takes half of the correction
        for i in 0..self.bodies.len() {
            for j in (i + 1)..self.bodies.len() {
                let delta = self.bodies[i].position - self.bodies[j].position;
                let dist = delta.norm();
                let min_dist = self.bodies[i].radius + self.bodies[j].radius;

                if dist >= min_dist {
                    continue;
                }

                let dir = if dist > 1e-9 {
                    delta / dist
                } else {
                    Vector2::new(1.0, 0.0)
                };
                let corr = dir * (min_dist - dist) * 0.5;
                self.bodies[i].position += corr;
                self.bodies[j].position -= corr;

                contacts.push(Contact::Agent { body: i, other: j });
                contacts.push(Contact::Agent { body: j, other: i });
            }
        }

        // walls last so that no body is pushed out of the arena
        let barrier = self.barrier;
        for (id, body) in self.bodies.iter_mut().enumerate() {
            for wall in self.walls.iter().chain(barrier.iter()) {
                let depth = wall.penetration(body);
                if depth > 0.0 {
                    body.position += wall.normal * depth;
                    contacts.push(Contact::Wall {
                        body: id,
                        normal: wall.normal,
                    });
                }
            }
        }

        for id in 0..self.bodies.len() {
            let inside = self.in_finish_zone(&self.bodies[id]);
            if inside && !self.in_finish[id] {
                contacts.push(Contact::FinishBoundary { body: id });
            }
            self.in_finish[id] = inside;
        }

        contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn arena_without_barrier() -> Arena {
        Arena::new(&ArenaPars {
            barrier_x: None,
            ..ArenaPars::default()
        })
    }

    #[test]
    fn impulse_changes_velocity_immediately_force_on_step() {
        let mut body = RigidBody::new(Vector2::new(5.0, 5.0), 0.5, 2.0);
        body.add_force(Vector2::new(4.0, 0.0), ForceMode::Impulse);
        assert_abs_diff_eq!(body.velocity.x, 2.0, epsilon = 1e-12);

        let mut arena = Arena::new(&ArenaPars {
            linear_drag: 0.0,
            ..ArenaPars::default()
        });
        let id = arena.spawn(RigidBody::new(Vector2::new(2.0, 5.0), 0.5, 1.0));
        arena.body_mut(id).add_force(Vector2::new(0.0, 1.0), ForceMode::Force);
        arena.step(0.5);
        assert_abs_diff_eq!(arena.body(id).velocity.y, 0.5, epsilon = 1e-12);

        // pending force is consumed by the step
        arena.step(0.5);
        assert_abs_diff_eq!(arena.body(id).velocity.y, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn wall_contact_pushes_body_back_and_reports_inward_normal() {
        let mut arena = arena_without_barrier();
        let id = arena.spawn(RigidBody::new(Vector2::new(10.0, 0.6), 0.5, 1.0));
        arena.body_mut(id).velocity = Vector2::new(0.0, -10.0);

        let contacts = arena.step(0.02);

        assert_eq!(
            contacts,
            vec![Contact::Wall {
                body: id,
                normal: Vector2::new(0.0, 1.0)
            }]
        );
        assert_abs_diff_eq!(arena.body(id).position.y, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn barrier_holds_until_removed() {
        let mut arena = Arena::new(&ArenaPars::default());
        let id = arena.spawn(RigidBody::new(Vector2::new(3.4, 10.0), 0.5, 1.0));
        arena.body_mut(id).velocity = Vector2::new(10.0, 0.0);

        let contacts = arena.step(0.02);
        assert_eq!(
            contacts,
            vec![Contact::Wall {
                body: id,
                normal: Vector2::new(-1.0, 0.0)
            }]
        );
        assert_abs_diff_eq!(arena.body(id).position.x, 3.5, epsilon = 1e-9);

        arena.remove_barrier();
        assert!(!arena.has_barrier());
        assert!(arena.step(0.02).is_empty());
        assert!(arena.body(id).position.x > 3.5);
    }

    #[test]
    fn overlapping_bodies_are_separated_and_both_notified() {
        let mut arena = arena_without_barrier();
        let a = arena.spawn(RigidBody::new(Vector2::new(10.0, 10.0), 0.5, 1.0));
        let b = arena.spawn(RigidBody::new(Vector2::new(10.6, 10.0), 0.5, 1.0));

        let contacts = arena.step(0.02);

        assert_eq!(
            contacts,
            vec![
                Contact::Agent { body: a, other: b },
                Contact::Agent { body: b, other: a },
            ]
        );
        let dist = (arena.body(a).position - arena.body(b).position).norm();
        assert_abs_diff_eq!(dist, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn finish_zone_triggers_only_on_entry() {
        let mut arena = arena_without_barrier();
        let id = arena.spawn(RigidBody::new(Vector2::new(35.0, 10.0), 0.5, 1.0));
        arena.body_mut(id).velocity = Vector2::new(10.0, 0.0);

        let mut triggers = 0;
        for _ in 0..20 {
            triggers += arena
                .step(0.02)
                .iter()
                .filter(|c| matches!(c, Contact::FinishBoundary { .. }))
                .count();
        }

        assert_eq!(triggers, 1);
    }
}
