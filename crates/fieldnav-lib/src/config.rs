//! Tuning constants for graph construction, local stepping and agents.
//!
//! All distances are world units and all times are seconds of simulated time.
//! The defaults suit a map measured in metres with units a few metres across.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// File name used for the navigation graph cache inside the cache directory.
const GRAPH_CACHE_FILENAME: &str = "navgraph.bin";

/// Navigation tuning shared by the builder, the searches and every agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Length of one local stepper hop.
    pub step_size: f32,
    /// Angular increment of the fan search, in degrees.
    pub angle_increment_deg: f32,
    /// Largest deflection the fan search tries on either side, in degrees.
    pub max_deflection_deg: f32,
    /// Tolerance used for distance and multiplier comparisons.
    pub epsilon: f32,
    /// Local paths give up after `max_hop_factor * straight hops + 16` hops.
    pub max_hop_factor: f32,
    /// Maximum distance between two nodes joined by an arc.
    pub max_arc_distance: f32,
    /// Open-space sampling stride is `max_arc_distance - open_space_margin`.
    pub open_space_margin: f32,
    /// Maximum spacing between consecutive road nodes.
    pub road_node_spacing: f32,
    /// Nodes closer than this are pruned.
    pub min_node_separation: f32,
    /// Scale applied to straight-line distance by the A* heuristic.
    pub heuristic_scale: f32,
    /// Distance at which an intermediate path node counts as reached.
    pub waypoint_completion_dist: f32,
    /// Distance at which the final destination counts as reached. Never
    /// smaller than `waypoint_completion_dist`.
    pub final_completion_dist: f32,
    /// Minimum simulated time between waypoint recomputations.
    pub recompute_interval: f32,
    /// How far ahead along a road segment an agent aims.
    pub road_lookahead: f32,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            step_size: 10.0,
            angle_increment_deg: 5.0,
            max_deflection_deg: 85.0,
            epsilon: 1e-3,
            max_hop_factor: 4.0,
            max_arc_distance: 300.0,
            open_space_margin: 50.0,
            road_node_spacing: 200.0,
            min_node_separation: 40.0,
            heuristic_scale: 1.0,
            waypoint_completion_dist: 5.0,
            final_completion_dist: 15.0,
            recompute_interval: 0.25,
            road_lookahead: 20.0,
        }
    }
}

impl NavConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading navigation config");
        let raw = fs::read_to_string(path)?;
        let config: NavConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the planner loop or divide by zero.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            (self.step_size, "step_size"),
            (self.angle_increment_deg, "angle_increment_deg"),
            (self.max_deflection_deg, "max_deflection_deg"),
            (self.epsilon, "epsilon"),
            (self.max_hop_factor, "max_hop_factor"),
            (self.max_arc_distance, "max_arc_distance"),
            (self.road_node_spacing, "road_node_spacing"),
            (self.min_node_separation, "min_node_separation"),
            (self.waypoint_completion_dist, "waypoint_completion_dist"),
            (self.final_completion_dist, "final_completion_dist"),
        ];
        for (value, field) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::ConfigValidation {
                    field,
                    message: format!("must be a finite positive number, got {value}"),
                });
            }
        }

        let non_negative = [
            (self.open_space_margin, "open_space_margin"),
            (self.heuristic_scale, "heuristic_scale"),
            (self.recompute_interval, "recompute_interval"),
            (self.road_lookahead, "road_lookahead"),
        ];
        for (value, field) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::ConfigValidation {
                    field,
                    message: format!("must be a finite non-negative number, got {value}"),
                });
            }
        }

        if self.max_deflection_deg >= 180.0 {
            return Err(Error::ConfigValidation {
                field: "max_deflection_deg",
                message: "must be below 180 degrees".to_string(),
            });
        }
        if self.final_completion_dist < self.waypoint_completion_dist {
            return Err(Error::ConfigValidation {
                field: "final_completion_dist",
                message: format!(
                    "must not be smaller than waypoint_completion_dist ({})",
                    self.waypoint_completion_dist
                ),
            });
        }
        if self.open_space_stride() <= 0.0 {
            return Err(Error::ConfigValidation {
                field: "open_space_margin",
                message: "must be smaller than max_arc_distance".to_string(),
            });
        }
        Ok(())
    }

    /// Tile stride used when sampling open terrain.
    pub fn open_space_stride(&self) -> f32 {
        self.max_arc_distance - self.open_space_margin
    }
}

/// Resolve the default graph cache location using platform-specific project
/// directories.
pub fn default_graph_cache_path() -> Result<PathBuf> {
    let dirs =
        ProjectDirs::from("com", "fieldnav", "fieldnav").ok_or(Error::CacheDirsUnavailable)?;
    Ok(dirs.cache_dir().join(GRAPH_CACHE_FILENAME))
}
