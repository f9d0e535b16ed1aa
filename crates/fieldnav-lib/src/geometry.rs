//! World-space points and the small amount of vector math the planner needs.
//!
//! `y` is up. Headings and deflections are measured in the ground (x/z)
//! plane; heights come from the terrain oracle.

use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A point (or displacement) in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const ZERO: Position = Position {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(&self, other: &Self) -> f32 {
        (*other - *self).length()
    }

    /// Distance measured in the ground plane only.
    pub fn ground_distance_to(&self, other: &Self) -> f32 {
        let dx = other.x - self.x;
        let dz = other.z - self.z;
        (dx * dx + dz * dz).sqrt()
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit heading in the ground plane, or `None` for a vertical/zero vector.
    pub fn ground_direction(&self) -> Option<Position> {
        let len = (self.x * self.x + self.z * self.z).sqrt();
        if len <= f32::EPSILON {
            return None;
        }
        Some(Position::new(self.x / len, 0.0, self.z / len))
    }

    /// Rotate around the vertical axis by `radians` (counter-clockwise when
    /// looking down from +y onto the x/z plane).
    pub fn rotate_y(&self, radians: f32) -> Position {
        let (sin, cos) = radians.sin_cos();
        Position::new(
            self.x * cos - self.z * sin,
            self.y,
            self.x * sin + self.z * cos,
        )
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn lerp(&self, other: &Self, t: f32) -> Position {
        *self + (*other - *self) * t
    }

    /// Same point with its height replaced.
    pub fn with_y(&self, y: f32) -> Position {
        Position::new(self.x, y, self.z)
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Project `self` onto the segment `a..b`, returning the clamped segment
    /// parameter and the projected point.
    pub fn project_onto_segment(&self, a: &Position, b: &Position) -> (f32, Position) {
        let ab = *b - *a;
        let len_sq = ab.dot(&ab);
        if len_sq <= f32::EPSILON {
            return (0.0, *a);
        }
        let t = ((*self - *a).dot(&ab) / len_sq).clamp(0.0, 1.0);
        (t, *a + ab * t)
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Position {
    type Output = Position;

    fn mul(self, rhs: f32) -> Position {
        Position::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

/// Parse `x,y,z` (whitespace around components is ignored).
impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(format!("expected x,y,z but got '{s}'"));
        }
        let mut coords = [0.0f32; 3];
        for (slot, part) in coords.iter_mut().zip(parts) {
            *slot = part
                .parse::<f32>()
                .map_err(|e| format!("invalid coordinate '{part}': {e}"))?;
        }
        Ok(Position::new(coords[0], coords[1], coords[2]))
    }
}
