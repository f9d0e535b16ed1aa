//! Local stepping: short, locally valid hops toward a goal.
//!
//! The stepper is the workhorse of the engine. Graph construction uses it to
//! price every arc, the global search uses it to connect the start and the
//! destination to the graph, and every agent uses it to pick its next
//! waypoint and to walk around whatever is in its way right now.
//!
//! # Fan search
//!
//! A hop is made of two half-steps. The first half-step leaves `start` at an
//! angle `ang1` off the straight line to the goal; the second leaves the
//! resulting midpoint at `ang2`, where `ang2` runs from zero (back onto the
//! original heading) out to `ang1`. Angles are tried in increasing order,
//! alternating left and right, so the first valid pair is the one that
//! deviates least and re-converges soonest. `ang1 == ang2 == 0` is reported
//! as [`Step::straight`].
//!
//! Costs are travel *time*: each half-step contributes its length divided by
//! the speed multiplier where it lands.

use tracing::trace;

use crate::config::NavConfig;
use crate::geometry::Position;
use crate::mobility::MobilityProfile;
use crate::terrain::TerrainOracle;

/// Travel time in seconds (at unit base speed).
pub type Cost = f32;

/// Cost of something that cannot be done at all.
pub const FOREVER: Cost = f32::INFINITY;

/// Hops allowed on top of the proportional budget, so that short paths around
/// a nearby obstacle are never starved.
const MIN_EXTRA_HOPS: usize = 16;

/// One accepted hop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    /// End of the first half-step.
    pub midpoint: Position,
    /// End of the hop.
    pub position: Position,
    /// True when the hop runs straight at the goal; callers may aim directly
    /// at the goal instead of the midpoint.
    pub straight: bool,
    /// Travel time of the hop.
    pub time: Cost,
}

/// Fan-search stepping parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalStepper {
    step_size: f32,
    angle_increment: f32,
    max_deflection: f32,
    epsilon: f32,
    max_hop_factor: f32,
}

impl LocalStepper {
    pub fn new(config: &NavConfig) -> Self {
        Self {
            step_size: config.step_size,
            angle_increment: config.angle_increment_deg.to_radians(),
            max_deflection: config.max_deflection_deg.to_radians(),
            epsilon: config.epsilon,
            max_hop_factor: config.max_hop_factor,
        }
    }

    pub fn step_size(&self) -> f32 {
        self.step_size
    }

    /// Find one hop from `start` toward `goal`, or `None` when every
    /// deflection within the angle budget is blocked.
    pub fn try_step(
        &self,
        terrain: &dyn TerrainOracle,
        start: Position,
        goal: Position,
        mobility: &MobilityProfile,
        agent_radius: f32,
    ) -> Option<Step> {
        let distance = start.ground_distance_to(&goal);
        if distance <= self.epsilon {
            return Some(Step {
                midpoint: goal,
                position: goal,
                straight: true,
                time: 0.0,
            });
        }

        let heading = (goal - start).ground_direction()?;
        let hop = distance.min(self.step_size);
        let half = hop * 0.5;
        let reaches_goal = hop >= distance;

        for ang1 in self.fan_angles() {
            let dir1 = heading.rotate_y(ang1);
            let midpoint = self.on_ground(terrain, start + dir1 * half);
            let mid_speed = terrain.speed_multiplier(mobility, midpoint, agent_radius, dir1);
            if mid_speed <= self.epsilon {
                continue;
            }

            let settle_steps = (ang1.abs() / self.angle_increment).round() as usize;
            for k in 0..=settle_steps {
                let ang2 = ang1.signum() * k as f32 * self.angle_increment;
                let dir2 = heading.rotate_y(ang2);
                let straight = ang1 == 0.0 && k == 0;
                let end = if straight && reaches_goal {
                    self.on_ground(terrain, goal)
                } else {
                    self.on_ground(terrain, midpoint + dir2 * half)
                };
                let end_speed = terrain.speed_multiplier(mobility, end, agent_radius, dir2);
                if end_speed <= self.epsilon {
                    continue;
                }

                return Some(Step {
                    midpoint,
                    position: end,
                    straight,
                    time: half / mid_speed + half / end_speed,
                });
            }
        }

        None
    }

    /// Travel time of a chain of hops from `start` to `goal`, or [`FOREVER`]
    /// when any hop fails or the hop budget runs out.
    pub fn find_local_path(
        &self,
        terrain: &dyn TerrainOracle,
        start: Position,
        goal: Position,
        mobility: &MobilityProfile,
        agent_radius: f32,
    ) -> Cost {
        let distance = start.ground_distance_to(&goal);
        if distance <= self.epsilon {
            return 0.0;
        }
        if !terrain.is_in_map(start) || !terrain.is_in_map(goal) {
            return FOREVER;
        }

        let direction = goal - start;
        if terrain.speed_multiplier(mobility, start, agent_radius, direction) <= self.epsilon
            || terrain.speed_multiplier(mobility, goal, agent_radius, direction) <= self.epsilon
        {
            return FOREVER;
        }

        let budget = (distance / self.step_size * self.max_hop_factor).ceil() as usize
            + MIN_EXTRA_HOPS;
        let mut current = start;
        let mut elapsed: Cost = 0.0;

        for _ in 0..budget {
            if current.ground_distance_to(&goal) <= self.epsilon {
                return elapsed;
            }
            match self.try_step(terrain, current, goal, mobility, agent_radius) {
                Some(step) => {
                    elapsed += step.time;
                    current = step.position;
                }
                None => {
                    trace!(from = %start, to = %goal, at = %current, "local path blocked");
                    return FOREVER;
                }
            }
        }

        if current.ground_distance_to(&goal) <= self.epsilon {
            return elapsed;
        }
        trace!(from = %start, to = %goal, budget, "local path exhausted hop budget");
        FOREVER
    }

    /// `0, +inc, -inc, +2inc, -2inc, ...` up to the maximum deflection.
    fn fan_angles(&self) -> impl Iterator<Item = f32> {
        let increment = self.angle_increment;
        let limit = (self.max_deflection / increment + 1e-3).floor() as usize;
        std::iter::once(0.0).chain((1..=limit).flat_map(move |k| {
            let angle = k as f32 * increment;
            [angle, -angle]
        }))
    }

    fn on_ground(&self, terrain: &dyn TerrainOracle, position: Position) -> Position {
        position.with_y(terrain.height(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mobility::MobilityRegistry;
    use crate::terrain::{GridTerrain, Obstacle, TerrainClass};

    fn walker() -> MobilityProfile {
        let mut registry = MobilityRegistry::new();
        let id = registry
            .register("walker", 0.0, 0.0, [1.0; TerrainClass::COUNT])
            .expect("register");
        registry.get(id).cloned().expect("profile")
    }

    fn open_field() -> GridTerrain {
        GridTerrain::flat([-500.0, -500.0], 10.0, 100, 100, TerrainClass::Plain)
    }

    #[test]
    fn fan_alternates_left_and_right() {
        let stepper = LocalStepper::new(&NavConfig::default());
        let angles: Vec<f32> = stepper.fan_angles().take(5).collect();
        assert_eq!(angles[0], 0.0);
        assert!(angles[1] > 0.0 && (angles[1] + angles[2]).abs() < 1e-6);
        assert!((angles[3] - 2.0 * angles[1]).abs() < 1e-6);
        assert_eq!(stepper.fan_angles().count(), 1 + 2 * 17);
    }

    #[test]
    fn open_ground_steps_straight() {
        let stepper = LocalStepper::new(&NavConfig::default());
        let terrain = open_field();
        let step = stepper
            .try_step(
                &terrain,
                Position::ZERO,
                Position::new(100.0, 0.0, 0.0),
                &walker(),
                0.0,
            )
            .expect("open ground");
        assert!(step.straight);
        assert!((step.position.x - 10.0).abs() < 1e-4);
        assert!((step.time - 10.0).abs() < 1e-4);
    }

    #[test]
    fn short_hop_lands_on_goal() {
        let stepper = LocalStepper::new(&NavConfig::default());
        let terrain = open_field();
        let goal = Position::new(3.0, 0.0, 4.0);
        let step = stepper
            .try_step(&terrain, Position::ZERO, goal, &walker(), 0.0)
            .expect("open ground");
        assert_eq!(step.position, goal);
        assert!((step.time - 5.0).abs() < 1e-4);
    }

    #[test]
    fn zero_distance_costs_nothing() {
        let stepper = LocalStepper::new(&NavConfig::default());
        let terrain = open_field();
        let here = Position::new(1.0, 0.0, 1.0);
        assert_eq!(
            stepper.find_local_path(&terrain, here, here, &walker(), 0.0),
            0.0
        );
    }

    #[test]
    fn start_inside_obstacle_is_rejected() {
        let stepper = LocalStepper::new(&NavConfig::default());
        let mut terrain = open_field();
        terrain.add_obstacle(Obstacle::new(Position::ZERO, 20.0));
        let cost = stepper.find_local_path(
            &terrain,
            Position::new(5.0, 0.0, 0.0),
            Position::new(200.0, 0.0, 0.0),
            &walker(),
            0.0,
        );
        assert_eq!(cost, FOREVER);
    }

    #[test]
    fn enclosed_start_fails_to_step() {
        let stepper = LocalStepper::new(&NavConfig::default());
        let mut terrain = open_field();
        for k in 0..36 {
            let angle = (k as f32 * 10.0).to_radians();
            let center = Position::new(8.0 * angle.cos(), 0.0, 8.0 * angle.sin());
            terrain.add_obstacle(Obstacle::new(center, 2.0));
        }
        let step = stepper.try_step(
            &terrain,
            Position::ZERO,
            Position::new(100.0, 0.0, 0.0),
            &walker(),
            1.0,
        );
        assert!(step.is_none());
    }
}
