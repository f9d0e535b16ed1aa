//! Fieldnav library entry points.
//!
//! This crate builds navigation graphs over a terrain, prices them per unit
//! mobility profile, and routes many agents across them in real time: a
//! local fan-search stepper, an A* global search, per-agent pathfinders and a
//! single background path worker. Higher-level consumers (the CLI, game
//! loops) should only depend on the items exported here instead of
//! reimplementing behavior.
//!

#![deny(warnings)]

pub mod cache;
pub mod config;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod mobility;
pub mod movement;
pub mod pathfinder;
mod pipeline;
pub mod search;
pub mod spatial;
pub mod stepper;
pub mod terrain;
pub mod world;

pub use cache::{content_key, load_graphs, load_or_build, save_graphs, ContentKey};
pub use config::{default_graph_cache_path, NavConfig};
pub use error::{Error, Result};
pub use geometry::Position;
pub use graph::{GraphBuilder, GraphKind, GraphNode, NavArc, NavGraph, NavGraphs, NodeId};
pub use mobility::{MobilityId, MobilityProfile, MobilityRegistry};
pub use movement::{Agent, InfantryMovement, MovementStrategy, VehicleMovement};
pub use pathfinder::Pathfinder;
pub use search::{GlobalSearch, MovementMode, PathNode, PathResult};
pub use spatial::NodeIndex;
pub use stepper::{Cost, LocalStepper, Step, FOREVER};
pub use terrain::{
    GridTerrain, MapBounds, Obstacle, RegionShape, RegionSpec, Road, TerrainClass,
    TerrainOracle, TerrainSpec,
};
pub use world::NavigationWorld;
