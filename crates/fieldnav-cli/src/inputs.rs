//! Loading the files every subcommand starts from.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use fieldnav_lib::{
    content_key, load_or_build, ContentKey, GraphBuilder, GridTerrain, MobilityRegistry,
    NavConfig, NavGraphs, NavigationWorld, TerrainOracle, TerrainSpec,
};

/// A terrain description, its grid, the mobility catalog and the tuning.
#[derive(Debug)]
pub struct Inputs {
    pub spec: TerrainSpec,
    pub terrain: Arc<GridTerrain>,
    pub registry: MobilityRegistry,
    pub config: NavConfig,
}

impl Inputs {
    pub fn load(terrain: &Path, mobility: &Path, config: Option<&Path>) -> Result<Self> {
        let spec = TerrainSpec::from_path(terrain)
            .with_context(|| format!("failed to load terrain from {}", terrain.display()))?;
        let grid = GridTerrain::from_spec(&spec)
            .with_context(|| format!("failed to build terrain grid from {}", terrain.display()))?;
        let registry = MobilityRegistry::from_path(mobility).with_context(|| {
            format!("failed to load mobility catalog from {}", mobility.display())
        })?;
        let config = match config {
            Some(path) => NavConfig::from_path(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => NavConfig::default(),
        };
        debug!(
            profiles = registry.len(),
            roads = spec.roads.len(),
            "inputs loaded"
        );

        Ok(Self {
            spec,
            terrain: Arc::new(grid),
            registry,
            config,
        })
    }

    /// Cache key covering the terrain description, config and catalog.
    pub fn key(&self) -> Result<ContentKey> {
        content_key(&self.spec, &self.config, &self.registry)
            .context("failed to compute graph cache key")
    }

    /// Build both navigation graphs from scratch.
    pub fn build_graphs(&self) -> NavGraphs {
        GraphBuilder::new(self.terrain.as_ref(), &self.registry, &self.config)
            .build(&self.spec.roads)
    }

    /// Graphs from `cache` when it matches these inputs, otherwise freshly
    /// built (and written to `cache` when one is given).
    pub fn graphs(&self, cache: Option<&Path>) -> Result<NavGraphs> {
        let Some(path) = cache else {
            return Ok(self.build_graphs());
        };
        let key = self.key()?;
        load_or_build(path, &key, self.registry.len(), || self.build_graphs())
            .with_context(|| format!("failed to prepare graphs via cache {}", path.display()))
    }

    /// Start a navigation world over these inputs.
    pub fn into_world(self, graphs: NavGraphs) -> Result<NavigationWorld> {
        let terrain: Arc<dyn TerrainOracle> = self.terrain;
        NavigationWorld::with_graphs(terrain, self.registry, graphs, self.config)
            .context("failed to start navigation world")
    }
}
