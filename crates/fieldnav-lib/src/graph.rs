//! Navigation graph storage and construction.
//!
//! Two graphs are built per map:
//!
//! - the **fast** graph: road nodes plus a coarse sampling of open terrain,
//!   used for long-range commanded moves;
//! - the **regular** graph: only the road nodes near bridges, used by careful
//!   movement modes that otherwise rely on direct local stepping.
//!
//! Nodes live in an arena indexed by [`NodeId`]. Each arc stores one
//! traversal time per registered mobility profile, priced once by running
//! the [`LocalStepper`] between its endpoints. Search state is never stored
//! in the graph; see [`crate::search`].

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::NavConfig;
use crate::geometry::Position;
use crate::mobility::{MobilityId, MobilityRegistry};
use crate::spatial::NodeIndex;
use crate::stepper::{Cost, LocalStepper, FOREVER};
use crate::terrain::{Road, TerrainClass, TerrainOracle};

/// Dense identifier of a node within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which of the two navigation graphs a node or path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphKind {
    Fast,
    Regular,
}

/// A node of the navigation graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub position: Position,
    /// Road nodes keep agents on the road centerline between them.
    pub is_road: bool,
    /// Indices into the graph's arc table.
    pub arcs: Vec<usize>,
}

/// Undirected connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavArc {
    pub a: NodeId,
    pub b: NodeId,
    /// Traversal time per mobility profile, in profile id order.
    pub times: Vec<Cost>,
}

impl NavArc {
    /// The endpoint that is not `node`.
    pub fn other(&self, node: NodeId) -> NodeId {
        if self.a == node {
            self.b
        } else {
            self.a
        }
    }

    /// Traversal time for a profile; [`FOREVER`] when it cannot cross.
    pub fn time(&self, mobility: MobilityId) -> Cost {
        self.times.get(mobility.index()).copied().unwrap_or(FOREVER)
    }

    fn connects(&self, a: NodeId, b: NodeId) -> bool {
        (self.a == a && self.b == b) || (self.a == b && self.b == a)
    }
}

/// One navigation graph.
#[derive(Debug)]
pub struct NavGraph {
    kind: GraphKind,
    nodes: Vec<GraphNode>,
    arcs: Vec<Option<NavArc>>,
    /// Vacated arc slots, reused before the table grows.
    free_slots: Vec<usize>,
    profile_count: usize,
    index: NodeIndex,
}

impl NavGraph {
    /// An empty graph for `profile_count` mobility profiles.
    pub fn empty(kind: GraphKind, profile_count: usize) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
            arcs: Vec::new(),
            free_slots: Vec::new(),
            profile_count,
            index: NodeIndex::new(),
        }
    }

    /// Reassemble a graph from stored parts, rebuilding the spatial index.
    pub fn from_parts(
        kind: GraphKind,
        nodes: Vec<GraphNode>,
        arcs: Vec<Option<NavArc>>,
        profile_count: usize,
    ) -> Self {
        let index = NodeIndex::build(nodes.iter().map(|node| node.position));
        let free_slots = arcs
            .iter()
            .enumerate()
            .rev()
            .filter_map(|(slot, arc)| arc.is_none().then_some(slot))
            .collect();
        Self {
            kind,
            nodes,
            arcs,
            free_slots,
            profile_count,
            index,
        }
    }

    pub fn kind(&self) -> GraphKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id.index())
    }

    /// Arc table, including vacated slots.
    pub fn arc_slots(&self) -> &[Option<NavArc>] {
        &self.arcs
    }

    /// Live arcs.
    pub fn arcs(&self) -> impl Iterator<Item = &NavArc> {
        self.arcs.iter().flatten()
    }

    pub fn arc_count(&self) -> usize {
        self.arcs().count()
    }

    /// Number of per-profile entries every arc carries.
    pub fn profile_count(&self) -> usize {
        self.profile_count
    }

    /// Arcs incident to `node`.
    pub fn arcs_of(&self, node: NodeId) -> impl Iterator<Item = &NavArc> {
        self.node(node)
            .map(|n| n.arcs.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |&slot| self.arcs.get(slot).and_then(Option::as_ref))
    }

    /// Neighbours of `node` and the time `mobility` needs to reach each.
    pub fn neighbours(
        &self,
        node: NodeId,
        mobility: MobilityId,
    ) -> impl Iterator<Item = (NodeId, Cost)> + '_ {
        self.arcs_of(node)
            .map(move |arc| (arc.other(node), arc.time(mobility)))
    }

    pub fn arc_between(&self, a: NodeId, b: NodeId) -> Option<&NavArc> {
        self.arcs_of(a).find(|arc| arc.connects(a, b))
    }

    /// Nodes strictly within `radius` of `point`, nearest first.
    pub fn nodes_within(&self, point: Position, radius: f32) -> Vec<(NodeId, f32)> {
        self.index
            .within_radius(point, radius)
            .into_iter()
            .map(|(item, distance)| (NodeId(item as u32), distance))
            .collect()
    }

    fn add_node(&mut self, position: Position, is_road: bool) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.index.insert(position, id.index());
        self.nodes.push(GraphNode {
            id,
            position,
            is_road,
            arcs: Vec::new(),
        });
        id
    }

    fn add_arc(&mut self, a: NodeId, b: NodeId, times: Vec<Cost>) {
        debug_assert_eq!(times.len(), self.profile_count);
        let slot = match self.free_slots.pop() {
            Some(free) => {
                self.arcs[free] = Some(NavArc { a, b, times });
                free
            }
            None => {
                self.arcs.push(Some(NavArc { a, b, times }));
                self.arcs.len() - 1
            }
        };
        self.nodes[a.index()].arcs.push(slot);
        self.nodes[b.index()].arcs.push(slot);
    }

    /// Remove the arc between `a` and `b`. Returns whether one existed.
    pub fn remove_arc(&mut self, a: NodeId, b: NodeId) -> bool {
        let Some(slot) = self.node(a).and_then(|node| {
            node.arcs.iter().copied().find(|&slot| {
                self.arcs
                    .get(slot)
                    .and_then(Option::as_ref)
                    .is_some_and(|arc| arc.connects(a, b))
            })
        }) else {
            return false;
        };

        self.arcs[slot] = None;
        self.free_slots.push(slot);
        self.nodes[a.index()].arcs.retain(|&s| s != slot);
        self.nodes[b.index()].arcs.retain(|&s| s != slot);
        true
    }

    /// Drop the arc between `a` and `b` and price it again against the
    /// terrain as it is now, for a unit of `agent_radius`. The arc is only
    /// re-added when some profile can still cross it. Returns whether it was
    /// re-added.
    pub fn reprice_arc(
        &mut self,
        a: NodeId,
        b: NodeId,
        terrain: &dyn TerrainOracle,
        registry: &MobilityRegistry,
        stepper: &LocalStepper,
        agent_radius: f32,
    ) -> bool {
        let (Some(from), Some(to)) = (self.node(a), self.node(b)) else {
            return false;
        };
        let (from, to) = (from.position, to.position);

        self.remove_arc(a, b);
        let times = price_arc(terrain, registry, stepper, from, to, agent_radius);
        let passable = times.iter().any(|t| t.is_finite());
        if passable {
            self.add_arc(a, b, times);
        }
        debug!(
            graph = ?self.kind,
            a = a.0,
            b = b.0,
            passable,
            "repriced navigation arc"
        );
        passable
    }
}

/// The fast and regular graphs of one map.
#[derive(Debug)]
pub struct NavGraphs {
    pub fast: NavGraph,
    pub regular: NavGraph,
}

impl NavGraphs {
    pub fn get(&self, kind: GraphKind) -> &NavGraph {
        match kind {
            GraphKind::Fast => &self.fast,
            GraphKind::Regular => &self.regular,
        }
    }

    pub fn get_mut(&mut self, kind: GraphKind) -> &mut NavGraph {
        match kind {
            GraphKind::Fast => &mut self.fast,
            GraphKind::Regular => &mut self.regular,
        }
    }
}

/// Traversal time from `from` to `to` for every registered profile.
pub fn price_arc(
    terrain: &dyn TerrainOracle,
    registry: &MobilityRegistry,
    stepper: &LocalStepper,
    from: Position,
    to: Position,
    agent_radius: f32,
) -> Vec<Cost> {
    registry
        .profiles()
        .iter()
        .map(|profile| stepper.find_local_path(terrain, from, to, profile, agent_radius))
        .collect()
}

/// A node position proposed before pruning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub position: Position,
    pub is_road: bool,
}

/// Builds navigation graphs for one map.
pub struct GraphBuilder<'a> {
    terrain: &'a dyn TerrainOracle,
    registry: &'a MobilityRegistry,
    config: &'a NavConfig,
    stepper: LocalStepper,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        terrain: &'a dyn TerrainOracle,
        registry: &'a MobilityRegistry,
        config: &'a NavConfig,
    ) -> Self {
        Self {
            terrain,
            registry,
            config,
            stepper: LocalStepper::new(config),
        }
    }

    /// Build both graphs.
    pub fn build(&self, roads: &[Road]) -> NavGraphs {
        let fast = self.build_fast(roads);
        let regular = self.build_regular(&fast);
        NavGraphs { fast, regular }
    }

    /// Road vertices inside the map, densified so that consecutive road nodes
    /// are never more than `road_node_spacing` apart.
    pub fn road_candidates(&self, roads: &[Road]) -> Vec<Candidate> {
        let spacing = self.config.road_node_spacing;
        let mut candidates = Vec::new();

        for road in roads {
            for (index, vertex) in road.vertices.iter().enumerate() {
                if index > 0 {
                    let previous = road.vertices[index - 1];
                    let length = previous.ground_distance_to(vertex);
                    if length > spacing {
                        let segments =
                            ((length - self.config.epsilon) / spacing).ceil().max(1.0) as usize;
                        for k in 1..segments {
                            let t = k as f32 / segments as f32;
                            self.push_road_candidate(&mut candidates, previous.lerp(vertex, t));
                        }
                    }
                }
                self.push_road_candidate(&mut candidates, *vertex);
            }
        }

        candidates
    }

    fn push_road_candidate(&self, candidates: &mut Vec<Candidate>, position: Position) {
        if self.terrain.is_in_map(position) {
            candidates.push(Candidate {
                position: self.on_ground(position),
                is_road: true,
            });
        }
    }

    /// Centers of a coarse tiling of the map that sit on plain ground and are
    /// not already covered by an existing candidate.
    pub fn open_space_candidates(&self, existing: &[Candidate]) -> Vec<Candidate> {
        let stride = self.config.open_space_stride();
        // Adjacent tile centers sit exactly one stride apart.
        let coverage = stride * (1.0 - 1e-3);
        let bounds = self.terrain.bounds();

        let mut index = NodeIndex::build(existing.iter().map(|c| c.position));
        let mut candidates = Vec::new();

        let columns = (bounds.width() / stride).ceil().max(1.0) as usize;
        let rows = (bounds.depth() / stride).ceil().max(1.0) as usize;
        for row in 0..rows {
            for column in 0..columns {
                let probe = Position::new(
                    bounds.min_x + (column as f32 + 0.5) * stride,
                    0.0,
                    bounds.min_z + (row as f32 + 0.5) * stride,
                );
                if !self.terrain.is_in_map(probe)
                    || self.terrain.classify(probe) != TerrainClass::Plain
                    || index.any_within(probe, coverage)
                {
                    continue;
                }
                let position = self.on_ground(probe);
                index.insert(position, existing.len() + candidates.len());
                candidates.push(Candidate {
                    position,
                    is_road: false,
                });
            }
        }

        candidates
    }

    /// Keep candidates in order, dropping any closer than
    /// `min_node_separation` to one already kept.
    pub fn prune(&self, candidates: &[Candidate]) -> Vec<Candidate> {
        let mut index = NodeIndex::new();
        let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if index.any_within(candidate.position, self.config.min_node_separation) {
                continue;
            }
            index.insert(candidate.position, kept.len());
            kept.push(*candidate);
        }
        kept
    }

    /// Build the dense graph used by fast moves.
    pub fn build_fast(&self, roads: &[Road]) -> NavGraph {
        let mut candidates = self.road_candidates(roads);
        let road_count = candidates.len();
        let open = self.open_space_candidates(&candidates);
        candidates.extend(open);

        let kept = self.prune(&candidates);
        let graph = self.connect(GraphKind::Fast, &kept);
        info!(
            road_candidates = road_count,
            open_candidates = candidates.len() - road_count,
            pruned = candidates.len() - kept.len(),
            nodes = graph.len(),
            arcs = graph.arc_count(),
            "built fast navigation graph"
        );
        graph
    }

    /// Build the sparse graph of road nodes within half an arc of a bridge.
    pub fn build_regular(&self, fast: &NavGraph) -> NavGraph {
        let bridges = self.terrain.bridges();
        let reach = self.config.max_arc_distance * 0.5;
        let kept: Vec<Candidate> = fast
            .nodes()
            .iter()
            .filter(|node| node.is_road)
            .filter(|node| {
                bridges
                    .iter()
                    .any(|bridge| bridge.ground_distance_to(&node.position) < reach)
            })
            .map(|node| Candidate {
                position: node.position,
                is_road: true,
            })
            .collect();

        let graph = self.connect(GraphKind::Regular, &kept);
        info!(
            bridges = bridges.len(),
            nodes = graph.len(),
            arcs = graph.arc_count(),
            "built regular navigation graph"
        );
        graph
    }

    /// Create nodes for `kept` and price an arc for every pair within
    /// `max_arc_distance`.
    fn connect(&self, kind: GraphKind, kept: &[Candidate]) -> NavGraph {
        let mut graph = NavGraph::empty(kind, self.registry.len());
        for candidate in kept {
            graph.add_node(candidate.position, candidate.is_road);
        }

        let reach = self.config.max_arc_distance + self.config.epsilon;
        let mut pairs: Vec<(NodeId, NodeId)> = Vec::new();
        for node in graph.nodes() {
            for (other, _) in graph.nodes_within(node.position, reach) {
                if other > node.id {
                    pairs.push((node.id, other));
                }
            }
        }

        let priced: Vec<(NodeId, NodeId, Vec<Cost>)> = pairs
            .par_iter()
            .map(|&(a, b)| {
                let from = graph.nodes[a.index()].position;
                let to = graph.nodes[b.index()].position;
                let times = price_arc(self.terrain, self.registry, &self.stepper, from, to, 0.0);
                (a, b, times)
            })
            .collect();

        for (a, b, times) in priced {
            graph.add_arc(a, b, times);
        }
        graph
    }

    fn on_ground(&self, position: Position) -> Position {
        position.with_y(self.terrain.height(position))
    }
}
