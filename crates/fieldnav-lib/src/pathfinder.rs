//! Per-agent route following.
//!
//! A [`Pathfinder`] turns a commanded destination into a stream of short-range
//! movement targets. Routes are computed asynchronously on the world's path
//! worker; until one arrives the agent heads straight for the destination.
//! Every `recompute_interval` seconds of simulated time the pathfinder drops
//! path entries the agent has reached and asks the local stepper for the next
//! hop toward the nearest remaining one. When the stepper cannot make
//! progress, the agent replans from where it stands with its real radius
//! before giving up.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::geometry::Position;
use crate::graph::GraphKind;
use crate::mobility::MobilityId;
use crate::pipeline::{ArcRepair, PathRequest, RequestSender, RouteCell};
use crate::search::{MovementMode, PathNode, PathResult};
use crate::world::NavCore;

/// Navigation state of one agent.
pub struct Pathfinder {
    core: Arc<NavCore>,
    requests: RequestSender,
    cell: Arc<RouteCell>,
    mobility: MobilityId,
    agent_radius: f32,
    mode: MovementMode,
    destination: Option<Position>,
    /// Destination first; the agent works toward the last entry.
    path: Vec<PathNode>,
    path_graph: GraphKind,
    previous_node: Option<PathNode>,
    last_recompute: Option<f64>,
    waypoint: Option<Position>,
    stuck: bool,
    disposed: bool,
}

impl Pathfinder {
    pub(crate) fn new(
        core: Arc<NavCore>,
        requests: RequestSender,
        mobility: MobilityId,
        agent_radius: f32,
    ) -> Self {
        Self {
            core,
            requests,
            cell: Arc::new(RouteCell::default()),
            mobility,
            agent_radius,
            mode: MovementMode::Fast,
            destination: None,
            path: Vec::new(),
            path_graph: GraphKind::Fast,
            previous_node: None,
            last_recompute: None,
            waypoint: None,
            stuck: false,
            disposed: false,
        }
    }

    /// Order a move from `position` to `destination`. Returns immediately; the
    /// route is computed on the path worker.
    pub fn set_destination(&mut self, position: Position, destination: Position, mode: MovementMode) {
        if self.disposed {
            warn!("set_destination on a disposed pathfinder ignored");
            return;
        }

        self.reset_route(destination, mode);
        let generation = self.cell.begin(true);
        let request = PathRequest {
            start: position,
            destination,
            mode,
            mobility: self.mobility,
            agent_radius: self.agent_radius,
            generation,
            cell: Arc::downgrade(&self.cell),
        };
        if !self.requests.send(request) {
            warn!("path worker unavailable; heading straight for the destination");
            self.cell.abandon();
        }
    }

    /// Next movement target for an agent at `position` at simulated time
    /// `now` (seconds). `None` means: no orders, arrived, or stuck.
    pub fn get_next_waypoint(&mut self, position: Position, now: f64) -> Option<Position> {
        if self.disposed || self.destination.is_none() {
            return None;
        }

        if let Some(result) = self.cell.take() {
            self.install(result);
            self.last_recompute = None;
        }

        if let Some(last) = self.last_recompute {
            if now - last < f64::from(self.core.config.recompute_interval) {
                return self.waypoint;
            }
        }
        self.last_recompute = Some(now);
        self.waypoint = self.recompute(position);
        self.waypoint
    }

    pub fn has_destination(&self) -> bool {
        self.destination.is_some()
    }

    /// True exactly when no path entries remain.
    pub fn are_orders_complete(&self) -> bool {
        self.path.is_empty()
    }

    /// Stop where the agent stands. The path clears on the next recompute.
    pub fn cancel(&mut self, position: Position) {
        if self.disposed {
            return;
        }
        self.cell.begin(false);
        let mode = self.mode;
        self.reset_route(position, mode);
    }

    /// Detach from the path worker. Results still in flight are discarded.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.cell.dispose();
        self.destination = None;
        self.path.clear();
        self.waypoint = None;
    }

    /// True while a requested route has not come back from the worker.
    pub fn is_route_pending(&self) -> bool {
        self.cell.is_pending()
    }

    /// Block until the requested route arrives or `timeout` elapses.
    pub fn wait_for_route(&self, timeout: Duration) -> bool {
        self.cell.wait(timeout)
    }

    /// Set when the last recompute could not find any way forward.
    pub fn is_stuck(&self) -> bool {
        self.stuck
    }

    pub fn mode(&self) -> MovementMode {
        self.mode
    }

    pub fn mobility(&self) -> MobilityId {
        self.mobility
    }

    pub fn agent_radius(&self) -> f32 {
        self.agent_radius
    }

    /// Remaining path, destination first.
    pub fn path(&self) -> &[PathNode] {
        &self.path
    }

    fn reset_route(&mut self, destination: Position, mode: MovementMode) {
        self.destination = Some(destination);
        self.mode = mode;
        self.path = vec![PathNode::destination(destination)];
        self.path_graph = mode.graph_kind();
        self.previous_node = None;
        self.last_recompute = None;
        self.waypoint = None;
        self.stuck = false;
    }

    fn install(&mut self, result: PathResult) {
        debug!(
            entries = result.path.len(),
            cost = result.cost,
            "route arrived from path worker"
        );
        self.path = result.path;
        self.path_graph = result.graph;
        self.previous_node = None;
    }

    fn recompute(&mut self, position: Position) -> Option<Position> {
        let config = &self.core.config;
        loop {
            let target = *self.path.last()?;
            let threshold = if self.path.len() == 1 {
                config.final_completion_dist
            } else {
                config.waypoint_completion_dist
            };
            if position.ground_distance_to(&target.position) >= threshold {
                break;
            }

            self.path.pop();
            if self.path.is_empty() {
                debug!(at = %position, "destination reached");
                self.destination = None;
                self.previous_node = None;
                self.stuck = false;
                return None;
            }
            self.previous_node = Some(target);
        }

        if let Some(waypoint) = self.step_toward_target(position) {
            self.stuck = false;
            return Some(waypoint);
        }
        self.recover(position)
    }

    fn step_toward_target(&self, position: Position) -> Option<Position> {
        let target = self.path.last()?;
        let aim = self.aim_point(position, target);
        let profile = self.core.registry.get(self.mobility)?;
        let step = self.core.stepper.try_step(
            self.core.terrain.as_ref(),
            position,
            aim,
            profile,
            self.agent_radius,
        )?;
        Some(if step.straight { aim } else { step.midpoint })
    }

    /// Between two road nodes, aim at a point `road_lookahead` ahead of the
    /// agent's projection onto the road segment.
    fn aim_point(&self, position: Position, target: &PathNode) -> Position {
        match self.previous_node.filter(|p| p.is_road && target.is_road) {
            Some(previous) => road_aim(
                position,
                previous.position,
                target.position,
                self.core.config.road_lookahead,
                self.core.config.epsilon,
            ),
            None => target.position,
        }
    }

    /// Replan from `position` to the destination with the agent's own radius.
    fn recover(&mut self, position: Position) -> Option<Position> {
        let destination = self.path.first()?.position;
        let result = self.core.find_path(
            position,
            destination,
            self.mobility,
            self.agent_radius,
            self.mode,
        );

        if !result.is_reachable() {
            warn!(
                at = %position,
                destination = %destination,
                "agent stuck; no route from current position"
            );
            self.stuck = true;
            self.mode = MovementMode::Normal;
            return None;
        }

        let interior = self.path.len() > 1;
        let blocked_arc = self
            .previous_node
            .and_then(|previous| previous.node)
            .zip(self.path.last().and_then(|target| target.node));
        if interior {
            if let Some((a, b)) = blocked_arc {
                let repair = ArcRepair {
                    graph: self.path_graph,
                    a,
                    b,
                    agent_radius: self.agent_radius,
                };
                if self.requests.repair_arc(repair) {
                    debug!(a = a.0, b = b.0, "queued arc repair after stuck recovery");
                } else {
                    warn!(a = a.0, b = b.0, "path worker unavailable; arc left as is");
                }
            }
        }

        debug!(
            at = %position,
            entries = result.path.len(),
            cost = result.cost,
            "replanned after failed local step"
        );
        self.install(result);
        match self.step_toward_target(position) {
            Some(waypoint) => {
                self.stuck = false;
                Some(waypoint)
            }
            None => {
                self.stuck = true;
                None
            }
        }
    }
}

/// Point `lookahead` ahead of `position`'s ground-plane projection onto the
/// segment `from..to`, clamped to `to`.
fn road_aim(
    position: Position,
    from: Position,
    to: Position,
    lookahead: f32,
    epsilon: f32,
) -> Position {
    let length = from.ground_distance_to(&to);
    if length <= epsilon {
        return to;
    }
    let (t, _) = position
        .with_y(0.0)
        .project_onto_segment(&from.with_y(0.0), &to.with_y(0.0));
    let along = (t * length + lookahead) / length;
    if along >= 1.0 {
        to
    } else {
        from.lerp(&to, along)
    }
}

impl Drop for Pathfinder {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Pathfinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pathfinder")
            .field("mobility", &self.mobility)
            .field("mode", &self.mode)
            .field("destination", &self.destination)
            .field("remaining", &self.path.len())
            .field("stuck", &self.stuck)
            .finish()
    }
}
