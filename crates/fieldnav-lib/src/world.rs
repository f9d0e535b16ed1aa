//! The navigation world: graphs, terrain, profiles and the path worker for
//! one match or level.
//!
//! A [`NavigationWorld`] is built once and handed out by reference. Agents get
//! a [`Pathfinder`] from [`NavigationWorld::create_pathfinder`]; everything
//! they share (the graphs, the terrain, the profile table and the worker)
//! lives here rather than in globals.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{info, warn};

use crate::config::NavConfig;
use crate::error::{Error, Result};
use crate::geometry::Position;
use crate::graph::{GraphBuilder, GraphKind, NavGraphs, NodeId};
use crate::mobility::{MobilityId, MobilityRegistry};
use crate::pathfinder::Pathfinder;
use crate::pipeline::PathPipeline;
use crate::search::{GlobalSearch, MovementMode, PathNode, PathResult};
use crate::stepper::{LocalStepper, FOREVER};
use crate::terrain::{Road, TerrainOracle};

/// State shared by the world, every pathfinder and the path worker.
pub(crate) struct NavCore {
    graphs: RwLock<NavGraphs>,
    pub(crate) terrain: Arc<dyn TerrainOracle>,
    pub(crate) registry: Arc<MobilityRegistry>,
    pub(crate) config: NavConfig,
    pub(crate) stepper: LocalStepper,
}

impl NavCore {
    pub(crate) fn read_graphs(&self) -> RwLockReadGuard<'_, NavGraphs> {
        match self.graphs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("navigation graph lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_graphs(&self) -> RwLockWriteGuard<'_, NavGraphs> {
        match self.graphs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("navigation graph lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }

    pub(crate) fn find_path(
        &self,
        start: Position,
        destination: Position,
        mobility: MobilityId,
        agent_radius: f32,
        mode: MovementMode,
    ) -> PathResult {
        let Some(profile) = self.registry.get(mobility) else {
            warn!(mobility = mobility.index(), "path requested for unregistered mobility");
            return PathResult {
                path: vec![PathNode::destination(destination)],
                cost: FOREVER,
                graph: mode.graph_kind(),
            };
        };

        let graphs = self.read_graphs();
        GlobalSearch::new(&graphs, self.terrain.as_ref(), &self.stepper, &self.config)
            .find_path(start, destination, profile, agent_radius, mode)
    }

    /// Re-price the arc between two nodes against the terrain as it is now.
    /// Takes the graph write lock, so only the path worker calls it.
    pub(crate) fn reprice_arc(
        &self,
        kind: GraphKind,
        a: NodeId,
        b: NodeId,
        agent_radius: f32,
    ) -> bool {
        let mut graphs = self.write_graphs();
        graphs.get_mut(kind).reprice_arc(
            a,
            b,
            self.terrain.as_ref(),
            &self.registry,
            &self.stepper,
            agent_radius,
        )
    }
}

/// Everything navigation needs for one map.
pub struct NavigationWorld {
    core: Arc<NavCore>,
    pipeline: PathPipeline,
}

impl NavigationWorld {
    /// Build both graphs from the terrain and road network, then start the
    /// path worker.
    pub fn new(
        terrain: Arc<dyn TerrainOracle>,
        registry: MobilityRegistry,
        roads: &[Road],
        config: NavConfig,
    ) -> Result<Self> {
        config.validate()?;
        if registry.is_empty() {
            return Err(Error::MobilityValidation {
                message: "at least one mobility profile must be registered".to_string(),
            });
        }
        let graphs = GraphBuilder::new(terrain.as_ref(), &registry, &config).build(roads);
        Self::with_graphs(terrain, registry, graphs, config)
    }

    /// Use graphs built elsewhere (typically loaded from the graph cache).
    pub fn with_graphs(
        terrain: Arc<dyn TerrainOracle>,
        registry: MobilityRegistry,
        graphs: NavGraphs,
        config: NavConfig,
    ) -> Result<Self> {
        config.validate()?;
        for graph in [&graphs.fast, &graphs.regular] {
            if graph.profile_count() != registry.len() {
                return Err(Error::GraphCacheMismatch {
                    message: format!(
                        "{:?} graph carries {} traversal times per arc, {} profiles are registered",
                        graph.kind(),
                        graph.profile_count(),
                        registry.len()
                    ),
                });
            }
        }

        info!(
            fast_nodes = graphs.fast.len(),
            regular_nodes = graphs.regular.len(),
            profiles = registry.len(),
            "navigation world ready"
        );

        let stepper = LocalStepper::new(&config);
        let core = Arc::new(NavCore {
            graphs: RwLock::new(graphs),
            terrain,
            registry: Arc::new(registry),
            config,
            stepper,
        });
        let pipeline = PathPipeline::spawn(Arc::clone(&core))?;
        Ok(Self { core, pipeline })
    }

    /// A pathfinder for one agent. Its routes are computed on the shared
    /// worker.
    pub fn create_pathfinder(&self, mobility: MobilityId, agent_radius: f32) -> Result<Pathfinder> {
        if self.core.registry.get(mobility).is_none() {
            return Err(Error::UnknownMobility {
                name: format!("#{}", mobility.index()),
                known: self
                    .core
                    .registry
                    .profiles()
                    .iter()
                    .map(|p| p.name.clone())
                    .collect(),
            });
        }
        Ok(Pathfinder::new(
            Arc::clone(&self.core),
            self.pipeline.sender(),
            mobility,
            agent_radius,
        ))
    }

    /// Run a global search on the calling thread.
    pub fn find_path(
        &self,
        start: Position,
        destination: Position,
        mobility: MobilityId,
        agent_radius: f32,
        mode: MovementMode,
    ) -> PathResult {
        self.core
            .find_path(start, destination, mobility, agent_radius, mode)
    }

    /// Read access to both graphs.
    pub fn graphs(&self) -> RwLockReadGuard<'_, NavGraphs> {
        self.core.read_graphs()
    }

    pub fn registry(&self) -> &MobilityRegistry {
        &self.core.registry
    }

    pub fn config(&self) -> &NavConfig {
        &self.core.config
    }

    pub fn terrain(&self) -> &dyn TerrainOracle {
        self.core.terrain.as_ref()
    }

    pub fn stepper(&self) -> &LocalStepper {
        &self.core.stepper
    }
}

impl std::fmt::Debug for NavigationWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let graphs = self.core.read_graphs();
        f.debug_struct("NavigationWorld")
            .field("fast_nodes", &graphs.fast.len())
            .field("regular_nodes", &graphs.regular.len())
            .field("profiles", &self.core.registry.len())
            .finish()
    }
}
