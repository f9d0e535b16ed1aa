//! Terrain oracle interface and a grid-backed implementation.
//!
//! The navigation engine only ever asks the terrain a handful of questions:
//! what class of ground lies under a point, how high it is, whether it is on
//! the map, where the bridges are, and how fast a given unit can move across
//! it in a given direction. [`TerrainOracle`] captures exactly that.
//!
//! [`GridTerrain`] answers those questions from a regular cell grid with
//! bilinear height samples, painted roads, bridges and circular obstacles.
//! It is what the CLI and the test-suite run against, and it is built from a
//! [`TerrainSpec`] JSON document:
//!
//! ```json
//! {
//!   "origin": [0.0, 0.0],
//!   "cell_size": 10.0,
//!   "columns": 100,
//!   "rows": 60,
//!   "default_class": "plain",
//!   "regions": [
//!     { "class": "water", "shape": "rect", "min": [400.0, 0.0], "max": [460.0, 600.0] },
//!     { "class": "forest", "shape": "circle", "center": [200.0, 300.0], "radius": 80.0 }
//!   ],
//!   "roads": [ { "width": 12.0, "vertices": [ {"x": 0, "y": 0, "z": 300}, {"x": 1000, "y": 0, "z": 300} ] } ],
//!   "bridges": [ {"x": 430, "y": 0, "z": 300} ],
//!   "obstacles": [ { "center": {"x": 700, "y": 0, "z": 100}, "radius": 25.0 } ]
//! }
//! ```

use std::fs;
use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::geometry::Position;
use crate::mobility::MobilityProfile;

/// Half the baseline used to sample the directional grade under a unit.
const GRADE_PROBE: f32 = 1.0;

/// Classification of the ground at a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainClass {
    #[default]
    Plain,
    Road,
    Water,
    Forest,
    Bridge,
    Building,
}

impl TerrainClass {
    pub const COUNT: usize = 6;

    pub const ALL: [TerrainClass; TerrainClass::COUNT] = [
        TerrainClass::Plain,
        TerrainClass::Road,
        TerrainClass::Water,
        TerrainClass::Forest,
        TerrainClass::Bridge,
        TerrainClass::Building,
    ];

    /// Position of this class in per-class tables.
    pub fn index(self) -> usize {
        match self {
            TerrainClass::Plain => 0,
            TerrainClass::Road => 1,
            TerrainClass::Water => 2,
            TerrainClass::Forest => 3,
            TerrainClass::Bridge => 4,
            TerrainClass::Building => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TerrainClass::Plain => "plain",
            TerrainClass::Road => "road",
            TerrainClass::Water => "water",
            TerrainClass::Forest => "forest",
            TerrainClass::Bridge => "bridge",
            TerrainClass::Building => "building",
        }
    }
}

/// Axis-aligned ground-plane rectangle covered by the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    pub min_x: f32,
    pub min_z: f32,
    pub max_x: f32,
    pub max_z: f32,
}

impl MapBounds {
    pub fn contains(&self, position: Position) -> bool {
        position.x >= self.min_x
            && position.x < self.max_x
            && position.z >= self.min_z
            && position.z < self.max_z
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn depth(&self) -> f32 {
        self.max_z - self.min_z
    }
}

/// A circular no-go zone on the ground plane (a wreck, a crater, another unit).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub center: Position,
    pub radius: f32,
}

impl Obstacle {
    pub fn new(center: Position, radius: f32) -> Self {
        Self { center, radius }
    }

    /// True when a disc of `clearance` around `position` overlaps this zone.
    pub fn blocks(&self, position: Position, clearance: f32) -> bool {
        self.center.ground_distance_to(&position) < self.radius + clearance
    }
}

/// A road centerline and its width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Road {
    pub width: f32,
    pub vertices: Vec<Position>,
}

/// The questions the navigation engine asks about the ground.
///
/// Implementations must be safe to query from the path worker and from agent
/// update threads at the same time.
pub trait TerrainOracle: Send + Sync {
    /// Terrain class under a position.
    fn classify(&self, position: Position) -> TerrainClass;

    /// Ground height under a position.
    fn height(&self, position: Position) -> f32;

    /// Whether a position lies on the playable map.
    fn is_in_map(&self, position: Position) -> bool;

    /// Rectangle the graph builder samples open terrain over.
    fn bounds(&self) -> MapBounds;

    /// Bridge locations.
    fn bridges(&self) -> Vec<Position>;

    /// True when a unit of `agent_radius` standing at `position` would touch
    /// an obstacle.
    fn clearance_blocked(&self, _position: Position, _agent_radius: f32) -> bool {
        false
    }

    /// Speed multiplier for `mobility` at `position` travelling along
    /// `direction`. Zero means impassable.
    fn speed_multiplier(
        &self,
        mobility: &MobilityProfile,
        position: Position,
        agent_radius: f32,
        direction: Position,
    ) -> f32 {
        if !self.is_in_map(position) || self.clearance_blocked(position, agent_radius) {
            return 0.0;
        }

        let grade = match direction.ground_direction() {
            Some(heading) => {
                let ahead = self.height(position + heading * GRADE_PROBE);
                let behind = self.height(position - heading * GRADE_PROBE);
                (ahead - behind) / (2.0 * GRADE_PROBE)
            }
            None => 0.0,
        };

        mobility.speed_factor(self.classify(position), grade)
    }
}

/// Shape of a painted terrain region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum RegionShape {
    Rect { min: [f32; 2], max: [f32; 2] },
    Circle { center: [f32; 2], radius: f32 },
}

impl RegionShape {
    fn contains(&self, x: f32, z: f32) -> bool {
        match self {
            RegionShape::Rect { min, max } => {
                x >= min[0] && x <= max[0] && z >= min[1] && z <= max[1]
            }
            RegionShape::Circle { center, radius } => {
                let dx = x - center[0];
                let dz = z - center[1];
                dx * dx + dz * dz <= radius * radius
            }
        }
    }
}

/// A region of the grid painted with a terrain class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub class: TerrainClass,
    #[serde(flatten)]
    pub shape: RegionShape,
}

/// Serializable description of a [`GridTerrain`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainSpec {
    /// Ground-plane coordinates (x, z) of the grid's minimum corner.
    pub origin: [f32; 2],
    pub cell_size: f32,
    pub columns: usize,
    pub rows: usize,
    #[serde(default)]
    pub default_class: TerrainClass,
    #[serde(default)]
    pub regions: Vec<RegionSpec>,
    /// Row-major vertex heights, `(rows + 1) * (columns + 1)` values.
    #[serde(default)]
    pub heights: Option<Vec<f32>>,
    #[serde(default)]
    pub roads: Vec<Road>,
    #[serde(default)]
    pub bridges: Vec<Position>,
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
}

impl TerrainSpec {
    /// Load a terrain description from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading terrain description");
        let raw = fs::read_to_string(path)?;
        let spec: TerrainSpec = serde_json::from_str(&raw)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Check grid dimensions and the height table shape.
    pub fn validate(&self) -> Result<()> {
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(Error::TerrainValidation {
                message: "cell_size must be a finite positive number".to_string(),
            });
        }
        if self.columns == 0 || self.rows == 0 {
            return Err(Error::TerrainValidation {
                message: "grid must have at least one row and one column".to_string(),
            });
        }
        if let Some(heights) = &self.heights {
            let expected = (self.rows + 1) * (self.columns + 1);
            if heights.len() != expected {
                return Err(Error::TerrainValidation {
                    message: format!(
                        "expected {expected} height samples for a {}x{} grid, got {}",
                        self.columns,
                        self.rows,
                        heights.len()
                    ),
                });
            }
        }
        for (index, road) in self.roads.iter().enumerate() {
            if road.vertices.len() < 2 {
                return Err(Error::TerrainValidation {
                    message: format!("road {index} needs at least two vertices"),
                });
            }
            if !road.width.is_finite() || road.width <= 0.0 {
                return Err(Error::TerrainValidation {
                    message: format!("road {index} width must be positive"),
                });
            }
        }
        Ok(())
    }
}

/// Grid-backed terrain oracle.
#[derive(Debug)]
pub struct GridTerrain {
    origin_x: f32,
    origin_z: f32,
    cell_size: f32,
    columns: usize,
    rows: usize,
    classes: Vec<TerrainClass>,
    heights: Vec<f32>,
    bridges: Vec<Position>,
    obstacles: Vec<Obstacle>,
    /// Obstacles that move during play (other units), replaced wholesale.
    dynamic_obstacles: RwLock<Vec<Obstacle>>,
}

impl GridTerrain {
    /// Flat, uniform terrain.
    pub fn flat(
        origin: [f32; 2],
        cell_size: f32,
        columns: usize,
        rows: usize,
        class: TerrainClass,
    ) -> Self {
        Self {
            origin_x: origin[0],
            origin_z: origin[1],
            cell_size,
            columns,
            rows,
            classes: vec![class; columns * rows],
            heights: vec![0.0; (columns + 1) * (rows + 1)],
            bridges: Vec::new(),
            obstacles: Vec::new(),
            dynamic_obstacles: RwLock::new(Vec::new()),
        }
    }

    /// Build terrain from a validated description.
    pub fn from_spec(spec: &TerrainSpec) -> Result<Self> {
        spec.validate()?;
        let mut terrain = Self::flat(
            spec.origin,
            spec.cell_size,
            spec.columns,
            spec.rows,
            spec.default_class,
        );

        for region in &spec.regions {
            terrain.paint_region(region);
        }
        for road in &spec.roads {
            terrain.paint_road(road);
        }
        if let Some(heights) = &spec.heights {
            terrain.heights.clone_from(heights);
        }
        for bridge in &spec.bridges {
            if !terrain.is_in_map(*bridge) {
                warn!(bridge = %bridge, "bridge lies outside the map");
            }
            terrain.add_bridge(*bridge);
        }
        for obstacle in &spec.obstacles {
            terrain.add_obstacle(*obstacle);
        }

        debug!(
            columns = spec.columns,
            rows = spec.rows,
            roads = spec.roads.len(),
            bridges = terrain.bridges.len(),
            obstacles = terrain.obstacles.len(),
            "built grid terrain"
        );
        Ok(terrain)
    }

    /// Paint every cell whose center falls inside `region`.
    pub fn paint_region(&mut self, region: &RegionSpec) {
        for row in 0..self.rows {
            for column in 0..self.columns {
                let (x, z) = self.cell_center(column, row);
                if region.shape.contains(x, z) {
                    self.classes[row * self.columns + column] = region.class;
                }
            }
        }
    }

    /// Paint a road corridor. Water under the road becomes bridge deck.
    pub fn paint_road(&mut self, road: &Road) {
        let half_width = road.width * 0.5;
        for row in 0..self.rows {
            for column in 0..self.columns {
                let (x, z) = self.cell_center(column, row);
                let center = Position::new(x, 0.0, z);
                let on_road = road.vertices.windows(2).any(|segment| {
                    let a = segment[0].with_y(0.0);
                    let b = segment[1].with_y(0.0);
                    let (_, projected) = center.project_onto_segment(&a, &b);
                    projected.ground_distance_to(&center) <= half_width
                });
                if on_road {
                    let cell = &mut self.classes[row * self.columns + column];
                    *cell = match *cell {
                        TerrainClass::Water | TerrainClass::Bridge => TerrainClass::Bridge,
                        _ => TerrainClass::Road,
                    };
                }
            }
        }
    }

    pub fn set_class(&mut self, column: usize, row: usize, class: TerrainClass) {
        if column < self.columns && row < self.rows {
            self.classes[row * self.columns + column] = class;
        }
    }

    /// Set the height of a grid vertex.
    pub fn set_vertex_height(&mut self, column: usize, row: usize, height: f32) {
        if column <= self.columns && row <= self.rows {
            self.heights[row * (self.columns + 1) + column] = height;
        }
    }

    pub fn add_bridge(&mut self, position: Position) {
        self.bridges.push(position);
    }

    /// Add a permanent obstacle.
    pub fn add_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacles.push(obstacle);
    }

    /// Replace the set of moving obstacles (typically other units).
    pub fn set_dynamic_obstacles(&self, obstacles: Vec<Obstacle>) {
        match self.dynamic_obstacles.write() {
            Ok(mut guard) => *guard = obstacles,
            Err(poisoned) => {
                warn!("dynamic obstacle lock poisoned; replacing contents");
                *poisoned.into_inner() = obstacles;
            }
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn cell_center(&self, column: usize, row: usize) -> (f32, f32) {
        (
            self.origin_x + (column as f32 + 0.5) * self.cell_size,
            self.origin_z + (row as f32 + 0.5) * self.cell_size,
        )
    }

    fn cell_at(&self, position: Position) -> Option<(usize, usize)> {
        if !self.bounds().contains(position) {
            return None;
        }
        let column = ((position.x - self.origin_x) / self.cell_size) as usize;
        let row = ((position.z - self.origin_z) / self.cell_size) as usize;
        Some((column.min(self.columns - 1), row.min(self.rows - 1)))
    }

    fn vertex_height(&self, column: usize, row: usize) -> f32 {
        self.heights[row * (self.columns + 1) + column]
    }
}

impl TerrainOracle for GridTerrain {
    fn classify(&self, position: Position) -> TerrainClass {
        self.cell_at(position)
            .map(|(column, row)| self.classes[row * self.columns + column])
            .unwrap_or(TerrainClass::Building)
    }

    fn height(&self, position: Position) -> f32 {
        let gx = ((position.x - self.origin_x) / self.cell_size).clamp(0.0, self.columns as f32);
        let gz = ((position.z - self.origin_z) / self.cell_size).clamp(0.0, self.rows as f32);
        let c0 = (gx.floor() as usize).min(self.columns - 1);
        let r0 = (gz.floor() as usize).min(self.rows - 1);
        let tx = gx - c0 as f32;
        let tz = gz - r0 as f32;

        let h00 = self.vertex_height(c0, r0);
        let h10 = self.vertex_height(c0 + 1, r0);
        let h01 = self.vertex_height(c0, r0 + 1);
        let h11 = self.vertex_height(c0 + 1, r0 + 1);
        let near = h00 + (h10 - h00) * tx;
        let far = h01 + (h11 - h01) * tx;
        near + (far - near) * tz
    }

    fn is_in_map(&self, position: Position) -> bool {
        self.bounds().contains(position)
    }

    fn bounds(&self) -> MapBounds {
        MapBounds {
            min_x: self.origin_x,
            min_z: self.origin_z,
            max_x: self.origin_x + self.columns as f32 * self.cell_size,
            max_z: self.origin_z + self.rows as f32 * self.cell_size,
        }
    }

    fn bridges(&self) -> Vec<Position> {
        self.bridges.clone()
    }

    fn clearance_blocked(&self, position: Position, agent_radius: f32) -> bool {
        if self
            .obstacles
            .iter()
            .any(|obstacle| obstacle.blocks(position, agent_radius))
        {
            return true;
        }
        let dynamic = match self.dynamic_obstacles.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        dynamic
            .iter()
            .any(|obstacle| obstacle.blocks(position, agent_radius))
    }
}
