//! Output formatting for route and simulation reports.
//!
//! Route results come out of the engine destination first; everything here
//! renders them in travel order.

use std::fmt::Write as _;

use serde::Serialize;

use fieldnav_lib::{ContentKey, GraphKind, MovementMode, PathResult, Position};

/// Output format for the `route` subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// One entry of a rendered route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaypointReport {
    pub position: [f32; 3],
    pub node: Option<u32>,
    pub road: bool,
}

/// A route query and its answer, ready for printing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteReport {
    pub unit: String,
    pub mode: String,
    pub graph: String,
    pub from: [f32; 3],
    pub to: [f32; 3],
    pub reachable: bool,
    /// Travel time in seconds; absent when the destination is unreachable.
    pub cost: Option<f32>,
    pub waypoints: Vec<WaypointReport>,
}

impl RouteReport {
    pub fn new(
        unit: &str,
        mode: MovementMode,
        from: Position,
        to: Position,
        result: &PathResult,
    ) -> Self {
        let reachable = result.is_reachable();
        let waypoints = if reachable {
            result
                .path
                .iter()
                .rev()
                .map(|entry| WaypointReport {
                    position: entry.position.to_array(),
                    node: entry.node.map(|id| id.0),
                    road: entry.is_road,
                })
                .collect()
        } else {
            Vec::new()
        };
        let graph = match result.graph {
            GraphKind::Fast => "fast",
            GraphKind::Regular => "regular",
        };

        Self {
            unit: unit.to_string(),
            mode: mode.as_str().to_string(),
            graph: graph.to_string(),
            from: from.to_array(),
            to: to.to_array(),
            reachable,
            cost: reachable.then_some(result.cost),
            waypoints,
        }
    }

    pub fn render(&self, format: OutputFormat) -> serde_json::Result<String> {
        match format {
            OutputFormat::Text => Ok(self.render_text()),
            OutputFormat::Json => serde_json::to_string_pretty(self),
        }
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "route for {} ({} mode, {} graph): {} -> {}",
            self.unit,
            self.mode,
            self.graph,
            format_point(&self.from),
            format_point(&self.to)
        );
        let Some(cost) = self.cost else {
            out.push_str("no path\n");
            return out;
        };
        let _ = writeln!(out, "cost: {cost:.2}s");
        for (index, waypoint) in self.waypoints.iter().enumerate() {
            let tag = match (waypoint.node, waypoint.road) {
                (Some(id), true) => format!("node {id}, road"),
                (Some(id), false) => format!("node {id}"),
                (None, _) => "destination".to_string(),
            };
            let _ = writeln!(
                out,
                "{:>3}. {} [{}]",
                index + 1,
                format_point(&waypoint.position),
                tag
            );
        }
        out
    }
}

/// Final state of one simulated agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentOutcome {
    pub index: usize,
    pub position: [f32; 3],
    /// Tick on which the agent completed its orders.
    pub arrived_at: Option<usize>,
    pub stuck: bool,
}

/// Summary line plus one line per agent.
pub fn render_simulation(outcomes: &[AgentOutcome], ticks: usize) -> String {
    let arrived = outcomes.iter().filter(|o| o.arrived_at.is_some()).count();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "arrived: {arrived}/{} after {ticks} ticks",
        outcomes.len()
    );
    for outcome in outcomes {
        let state = match (outcome.arrived_at, outcome.stuck) {
            (Some(tick), _) => format!("arrived on tick {tick}"),
            (None, true) => "stuck".to_string(),
            (None, false) => "en route".to_string(),
        };
        let _ = writeln!(
            out,
            "agent {}: {} at {}",
            outcome.index,
            state,
            format_point(&outcome.position)
        );
    }
    out
}

/// Lowercase hex rendering of a graph cache content key.
pub fn format_key(key: &ContentKey) -> String {
    hex::encode(key)
}

fn format_point(point: &[f32; 3]) -> String {
    format!("({:.1}, {:.1}, {:.1})", point[0], point[1], point[2])
}
