//! Headless agents and the movement strategies that drive them.
//!
//! A [`MovementStrategy`] turns "head for this waypoint" into a new position
//! each tick. Foot units walk straight at the waypoint; vehicles turn at a
//! bounded rate and slow down while their heading is off. Strategies are
//! composed into an [`Agent`] together with its [`Pathfinder`].

use crate::geometry::Position;
use crate::pathfinder::Pathfinder;
use crate::search::MovementMode;

/// Per-archetype movement integration.
pub trait MovementStrategy: Send {
    /// Position after moving from `position` toward `waypoint` for `dt`
    /// seconds.
    fn advance(&mut self, position: Position, waypoint: Position, dt: f32) -> Position;
}

/// Walks straight at the waypoint at constant speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfantryMovement {
    pub speed: f32,
}

impl InfantryMovement {
    pub fn new(speed: f32) -> Self {
        Self { speed }
    }
}

impl MovementStrategy for InfantryMovement {
    fn advance(&mut self, position: Position, waypoint: Position, dt: f32) -> Position {
        move_toward(position, waypoint, self.speed * dt)
    }
}

/// Turns toward the waypoint at most `turn_rate` radians per second and moves
/// along its heading, scaled down while the heading is off target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleMovement {
    pub speed: f32,
    pub turn_rate: f32,
    heading: Option<Position>,
}

impl VehicleMovement {
    pub fn new(speed: f32, turn_rate: f32) -> Self {
        Self {
            speed,
            turn_rate,
            heading: None,
        }
    }

    /// Current ground-plane heading, once the vehicle has moved.
    pub fn heading(&self) -> Option<Position> {
        self.heading
    }
}

impl MovementStrategy for VehicleMovement {
    fn advance(&mut self, position: Position, waypoint: Position, dt: f32) -> Position {
        let Some(desired) = (waypoint - position).ground_direction() else {
            return position;
        };
        let heading = self.heading.unwrap_or(desired);

        let cross = heading.x * desired.z - heading.z * desired.x;
        let off = cross.atan2(heading.dot(&desired));
        let max_turn = self.turn_rate * dt;
        let turned = heading.rotate_y(off.clamp(-max_turn, max_turn));
        self.heading = Some(turned);

        let remaining = off - off.clamp(-max_turn, max_turn);
        let throttle = remaining.cos().max(0.0);
        let distance = position.ground_distance_to(&waypoint);
        let travel = (self.speed * dt * throttle).min(distance);
        if travel >= distance {
            return waypoint;
        }
        let t = if distance > 0.0 { travel / distance } else { 0.0 };
        let y = position.y + (waypoint.y - position.y) * t;
        Position::new(position.x + turned.x * travel, y, position.z + turned.z * travel)
    }
}

fn move_toward(position: Position, waypoint: Position, travel: f32) -> Position {
    let distance = position.ground_distance_to(&waypoint);
    if distance <= travel || distance <= f32::EPSILON {
        return waypoint;
    }
    position.lerp(&waypoint, travel / distance)
}

/// A unit without rendering: a position, a movement strategy and a
/// pathfinder.
pub struct Agent {
    position: Position,
    strategy: Box<dyn MovementStrategy>,
    pathfinder: Pathfinder,
}

impl Agent {
    pub fn new(position: Position, strategy: Box<dyn MovementStrategy>, pathfinder: Pathfinder) -> Self {
        Self {
            position,
            strategy,
            pathfinder,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn pathfinder(&self) -> &Pathfinder {
        &self.pathfinder
    }

    pub fn pathfinder_mut(&mut self) -> &mut Pathfinder {
        &mut self.pathfinder
    }

    /// Send the agent to `destination`.
    pub fn order(&mut self, destination: Position, mode: MovementMode) {
        self.pathfinder
            .set_destination(self.position, destination, mode);
    }

    /// Advance one tick of `dt` seconds ending at simulated time `now`.
    /// Returns the waypoint the agent moved toward, if any.
    pub fn tick(&mut self, now: f64, dt: f32) -> Option<Position> {
        let waypoint = self.pathfinder.get_next_waypoint(self.position, now)?;
        self.position = self.strategy.advance(self.position, waypoint, dt);
        Some(waypoint)
    }

    pub fn is_done(&self) -> bool {
        self.pathfinder.are_orders_complete()
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("position", &self.position)
            .field("pathfinder", &self.pathfinder)
            .finish()
    }
}
