//! Background path worker.
//!
//! Every global search in a world runs on one dedicated thread. Agents post
//! [`PathRequest`]s through a channel and never block; the worker drains the
//! queue in order and writes each result into the requesting agent's
//! [`RouteCell`]. A request carries a generation number and a weak handle to
//! its cell, so results for superseded orders or for disposed agents are
//! dropped instead of written.
//!
//! Graph writes go through the same queue. An agent that finds an arc
//! blocked posts an [`ArcRepair`]; the worker takes the graph write lock
//! between searches, so agent threads never wait on it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::geometry::Position;
use crate::graph::{GraphKind, NodeId};
use crate::mobility::MobilityId;
use crate::search::{MovementMode, PathResult};
use crate::world::NavCore;

/// One agent's route mailbox, shared with the worker.
#[derive(Debug, Default)]
pub(crate) struct RouteCell {
    state: Mutex<RouteState>,
    ready: Condvar,
}

#[derive(Debug, Default)]
struct RouteState {
    generation: u64,
    pending: bool,
    disposed: bool,
    delivered: Option<PathResult>,
}

impl RouteCell {
    fn lock(&self) -> MutexGuard<'_, RouteState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("route cell lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Start a new order. Any result still in flight for an older order will
    /// be discarded. Returns the new generation.
    pub(crate) fn begin(&self, pending: bool) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        state.pending = pending;
        state.delivered = None;
        state.generation
    }

    /// Stop accepting results for good.
    pub(crate) fn dispose(&self) {
        let mut state = self.lock();
        state.disposed = true;
        state.pending = false;
        state.delivered = None;
        self.ready.notify_all();
    }

    /// Take a delivered result, if one arrived since the last call.
    pub(crate) fn take(&self) -> Option<PathResult> {
        self.lock().delivered.take()
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.lock().pending
    }

    /// Mark the current order as answered without a result.
    pub(crate) fn abandon(&self) {
        let mut state = self.lock();
        state.pending = false;
        self.ready.notify_all();
    }

    /// Block until the current order is answered or `timeout` elapses.
    pub(crate) fn wait(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let waited = self
            .ready
            .wait_timeout_while(guard, timeout, |state| state.pending);
        let guard = match waited {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        };
        !guard.pending
    }

    fn is_current(&self, generation: u64) -> bool {
        let state = self.lock();
        !state.disposed && state.generation == generation
    }

    fn deliver(&self, generation: u64, result: PathResult) -> bool {
        let mut state = self.lock();
        if state.disposed || state.generation != generation {
            return false;
        }
        state.delivered = Some(result);
        state.pending = false;
        self.ready.notify_all();
        true
    }
}

/// A queued global search.
#[derive(Debug)]
pub(crate) struct PathRequest {
    pub start: Position,
    pub destination: Position,
    pub mode: MovementMode,
    pub mobility: MobilityId,
    pub agent_radius: f32,
    pub generation: u64,
    pub cell: Weak<RouteCell>,
}

/// A graph arc to price again against the current terrain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ArcRepair {
    pub graph: GraphKind,
    pub a: NodeId,
    pub b: NodeId,
    pub agent_radius: f32,
}

#[derive(Debug)]
pub(crate) enum WorkerCommand {
    Route(Box<PathRequest>),
    RepairArc(ArcRepair),
    Shutdown,
}

/// Cloneable handle agents use to enqueue requests.
#[derive(Debug, Clone)]
pub(crate) struct RequestSender {
    tx: mpsc::Sender<WorkerCommand>,
}

impl RequestSender {
    /// Enqueue without blocking. Returns false when the worker has gone away.
    pub(crate) fn send(&self, request: PathRequest) -> bool {
        self.tx
            .send(WorkerCommand::Route(Box::new(request)))
            .is_ok()
    }

    /// Queue an arc repair without blocking. Returns false when the worker
    /// has gone away.
    pub(crate) fn repair_arc(&self, repair: ArcRepair) -> bool {
        self.tx.send(WorkerCommand::RepairArc(repair)).is_ok()
    }
}

/// Owns the worker thread. Dropping it stops the worker and joins it.
pub(crate) struct PathPipeline {
    tx: mpsc::Sender<WorkerCommand>,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PathPipeline {
    pub(crate) fn spawn(core: Arc<NavCore>) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<WorkerCommand>();
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("fieldnav-path-worker".into())
            .spawn(move || {
                debug!("path worker started");
                let mut served = 0usize;
                let mut repaired = 0usize;
                while let Ok(command) = rx.recv() {
                    if worker_stop.load(Ordering::Acquire) {
                        break;
                    }
                    match command {
                        WorkerCommand::Route(request) => {
                            if serve(&core, *request) {
                                served += 1;
                            }
                        }
                        WorkerCommand::RepairArc(repair) => {
                            repair_arc(&core, repair);
                            repaired += 1;
                        }
                        WorkerCommand::Shutdown => break,
                    }
                }
                debug!(served, repaired, "path worker stopped");
            })
            .map_err(|err| Error::Worker(format!("failed to spawn path worker thread: {err}")))?;

        info!("path worker spawned");
        Ok(Self {
            tx,
            stop,
            handle: Some(handle),
        })
    }

    pub(crate) fn sender(&self) -> RequestSender {
        RequestSender {
            tx: self.tx.clone(),
        }
    }
}

impl Drop for PathPipeline {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        let _ = self.tx.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.join() {
                warn!(?err, "path worker thread panicked");
            }
        }
    }
}

/// Run one request. Returns whether a result was delivered.
fn serve(core: &NavCore, request: PathRequest) -> bool {
    let Some(cell) = request.cell.upgrade() else {
        trace!("dropping request for a disposed agent");
        return false;
    };
    if !cell.is_current(request.generation) {
        trace!(generation = request.generation, "dropping superseded request");
        return false;
    }

    let result = core.find_path(
        request.start,
        request.destination,
        request.mobility,
        request.agent_radius,
        request.mode,
    );
    let delivered = cell.deliver(request.generation, result);
    if !delivered {
        trace!(
            generation = request.generation,
            "discarding result for an order that changed while searching"
        );
    }
    delivered
}

fn repair_arc(core: &NavCore, repair: ArcRepair) {
    let passable = core.reprice_arc(repair.graph, repair.a, repair.b, repair.agent_radius);
    debug!(
        graph = ?repair.graph,
        a = repair.a.0,
        b = repair.b.0,
        passable,
        "repaired arc after stuck recovery"
    );
}
