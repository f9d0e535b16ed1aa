//! Global route search over a navigation graph.
//!
//! [`GlobalSearch::find_path`] joins the start and the destination to a graph
//! with local stepper paths and runs A* in between. The direct local path from
//! start to destination is always a candidate, so the returned cost is never
//! worse than walking straight there.
//!
//! Paths are stored destination-first: index 0 is the destination and the
//! last entry is the node nearest the start, so agents consume them by
//! popping from the end.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::NavConfig;
use crate::geometry::Position;
use crate::graph::{GraphKind, NavGraph, NavGraphs, NodeId};
use crate::mobility::MobilityProfile;
use crate::stepper::{Cost, LocalStepper, FOREVER};
use crate::terrain::TerrainOracle;

/// How an agent was ordered to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementMode {
    /// Long-range move that uses the dense graph and roads.
    #[default]
    Fast,
    Normal,
    Reverse,
}

impl MovementMode {
    /// Careful modes take a direct local path whenever one exists.
    pub fn is_careful(self) -> bool {
        !matches!(self, MovementMode::Fast)
    }

    /// Graph searched for this mode.
    pub fn graph_kind(self) -> GraphKind {
        match self {
            MovementMode::Fast => GraphKind::Fast,
            MovementMode::Normal | MovementMode::Reverse => GraphKind::Regular,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MovementMode::Fast => "fast",
            MovementMode::Normal => "normal",
            MovementMode::Reverse => "reverse",
        }
    }
}

impl fmt::Display for MovementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(MovementMode::Fast),
            "normal" => Ok(MovementMode::Normal),
            "reverse" => Ok(MovementMode::Reverse),
            other => Err(format!(
                "unknown movement mode '{other}' (expected fast, normal or reverse)"
            )),
        }
    }
}

/// One entry of a path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathNode {
    pub position: Position,
    /// Graph node this entry came from; `None` for the destination.
    pub node: Option<NodeId>,
    pub is_road: bool,
}

impl PathNode {
    pub fn destination(position: Position) -> Self {
        Self {
            position,
            node: None,
            is_road: false,
        }
    }
}

/// Outcome of a global search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    /// Destination first, node nearest the start last.
    pub path: Vec<PathNode>,
    /// Total travel time, [`FOREVER`] when the destination is unreachable.
    pub cost: Cost,
    /// Graph the interior nodes belong to.
    pub graph: GraphKind,
}

impl PathResult {
    fn direct(destination: Position, cost: Cost, graph: GraphKind) -> Self {
        Self {
            path: vec![PathNode::destination(destination)],
            cost,
            graph,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.cost.is_finite()
    }

    /// True when no graph node is involved.
    pub fn is_direct(&self) -> bool {
        self.path.len() == 1
    }
}

/// A* over one of the navigation graphs, with local stepping at both ends.
pub struct GlobalSearch<'a> {
    graphs: &'a NavGraphs,
    terrain: &'a dyn TerrainOracle,
    stepper: &'a LocalStepper,
    config: &'a NavConfig,
}

impl<'a> GlobalSearch<'a> {
    pub fn new(
        graphs: &'a NavGraphs,
        terrain: &'a dyn TerrainOracle,
        stepper: &'a LocalStepper,
        config: &'a NavConfig,
    ) -> Self {
        Self {
            graphs,
            terrain,
            stepper,
            config,
        }
    }

    /// Best route from `start` to `destination` for `mobility`.
    pub fn find_path(
        &self,
        start: Position,
        destination: Position,
        mobility: &MobilityProfile,
        agent_radius: f32,
        mode: MovementMode,
    ) -> PathResult {
        let kind = mode.graph_kind();
        if !self.terrain.is_in_map(destination) {
            debug!(destination = %destination, "destination outside map");
            return PathResult::direct(destination, FOREVER, kind);
        }

        let direct_cost =
            self.stepper
                .find_local_path(self.terrain, start, destination, mobility, agent_radius);
        if mode.is_careful() && direct_cost.is_finite() {
            return PathResult::direct(destination, direct_cost, kind);
        }

        let graph = self.graphs.get(kind);
        let seed_radius = match kind {
            GraphKind::Fast => Some(self.config.max_arc_distance),
            GraphKind::Regular => None,
        };
        let mut scratch = Scratch::new(graph.len());
        let mut queue = BinaryHeap::new();

        for (node, _) in candidates(graph, start, seed_radius) {
            let position = graph.nodes()[node.index()].position;
            let cost =
                self.stepper
                    .find_local_path(self.terrain, start, position, mobility, agent_radius);
            if cost.is_finite() && cost < scratch.g_score[node.index()] {
                scratch.g_score[node.index()] = cost;
                queue.push(AStarEntry::new(
                    node,
                    cost,
                    self.heuristic(position, destination),
                ));
            }
        }
        let seeded = queue.len();

        let mut best_cost = direct_cost;
        let mut best_predecessor: Option<NodeId> = None;
        let mut expanded = 0usize;

        while let Some(entry) = queue.pop() {
            if entry.estimate.0 > best_cost {
                break;
            }
            let current = entry.node;
            let index = current.index();
            if scratch.closed[index] || entry.cost.0 > scratch.g_score[index] {
                continue;
            }
            scratch.closed[index] = true;
            expanded += 1;

            let current_score = scratch.g_score[index];
            let position = graph.nodes()[index].position;
            // Every expanded node may finish the route; the heuristic bound only
            // skips hops that cannot beat the current best.
            if current_score + self.heuristic(position, destination) < best_cost {
                let finish = self.stepper.find_local_path(
                    self.terrain,
                    position,
                    destination,
                    mobility,
                    agent_radius,
                );
                if current_score + finish < best_cost {
                    best_cost = current_score + finish;
                    best_predecessor = Some(current);
                }
            }

            for (next, time) in graph.neighbours(current, mobility.id) {
                if !time.is_finite() || scratch.closed[next.index()] {
                    continue;
                }
                let tentative = current_score + time;
                if tentative < scratch.g_score[next.index()] {
                    scratch.g_score[next.index()] = tentative;
                    scratch.parent[next.index()] = Some(current);
                    let next_position = graph.nodes()[next.index()].position;
                    queue.push(AStarEntry::new(
                        next,
                        tentative,
                        self.heuristic(next_position, destination),
                    ));
                }
            }
        }

        debug!(
            graph = ?kind,
            seeded,
            expanded,
            direct_cost,
            cost = best_cost,
            "global search finished"
        );

        match best_predecessor {
            Some(last) => PathResult {
                path: reconstruct_path(graph, &scratch.parent, last, destination),
                cost: best_cost,
                graph: kind,
            },
            None => PathResult::direct(destination, direct_cost, kind),
        }
    }

    fn heuristic(&self, from: Position, to: Position) -> Cost {
        from.ground_distance_to(&to) * self.config.heuristic_scale
    }
}

/// Graph nodes considered as the first hop from `start`.
fn candidates(graph: &NavGraph, start: Position, radius: Option<f32>) -> Vec<(NodeId, f32)> {
    match radius {
        Some(radius) => graph.nodes_within(start, radius),
        None => graph
            .nodes()
            .iter()
            .map(|node| (node.id, node.position.ground_distance_to(&start)))
            .collect(),
    }
}

/// Per-search bookkeeping, indexed by node id. The graph itself holds no
/// search state.
struct Scratch {
    g_score: Vec<Cost>,
    parent: Vec<Option<NodeId>>,
    closed: Vec<bool>,
}

impl Scratch {
    fn new(len: usize) -> Self {
        Self {
            g_score: vec![FOREVER; len],
            parent: vec![None; len],
            closed: vec![false; len],
        }
    }
}

/// Destination first, then back-pointers from `last` to the seed node.
fn reconstruct_path(
    graph: &NavGraph,
    parents: &[Option<NodeId>],
    last: NodeId,
    destination: Position,
) -> Vec<PathNode> {
    let mut path = vec![PathNode::destination(destination)];
    let mut current = Some(last);
    while let Some(node) = current {
        let entry = &graph.nodes()[node.index()];
        path.push(PathNode {
            position: entry.position,
            node: Some(node),
            is_road: entry.is_road,
        });
        current = parents[node.index()];
    }
    path
}

#[derive(Copy, Clone, Debug, Default)]
struct FloatOrd(f32);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq(&other.0)
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct AStarEntry {
    node: NodeId,
    cost: FloatOrd,
    estimate: FloatOrd,
}

impl AStarEntry {
    fn new(node: NodeId, cost: Cost, heuristic: Cost) -> Self {
        Self {
            node,
            cost: FloatOrd(cost),
            estimate: FloatOrd(cost + heuristic),
        }
    }
}

impl Ord for AStarEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering so BinaryHeap becomes a min-heap by estimate.
        other
            .estimate
            .cmp(&self.estimate)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for AStarEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
