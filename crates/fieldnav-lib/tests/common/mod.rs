//! Shared fixtures for the integration tests.

use std::path::PathBuf;
use std::sync::Arc;

use fieldnav_lib::{
    GridTerrain, MobilityId, MobilityRegistry, NavConfig, NavigationWorld, TerrainClass,
    TerrainOracle, TerrainSpec,
};

/// Path to fixtures directory used by tests (terrain, mobility catalog).
#[allow(dead_code)]
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures")
}

/// The river map: a 1000x1000 field split by a north-south river, crossed by
/// one east-west road bridge at z = 500.
#[allow(dead_code)]
pub fn river_spec() -> TerrainSpec {
    TerrainSpec::from_path(&fixtures_dir().join("terrain.json")).expect("load fixture terrain.json")
}

#[allow(dead_code)]
pub fn fixture_registry() -> MobilityRegistry {
    MobilityRegistry::from_path(&fixtures_dir().join("mobility.csv"))
        .expect("load fixture mobility.csv")
}

#[allow(dead_code)]
pub fn river_world() -> NavigationWorld {
    let spec = river_spec();
    let terrain = GridTerrain::from_spec(&spec).expect("fixture terrain builds");
    let terrain: Arc<dyn TerrainOracle> = Arc::new(terrain);
    NavigationWorld::new(terrain, fixture_registry(), &spec.roads, NavConfig::default())
        .expect("river world builds")
}

/// A single profile that moves at full speed on every terrain class and
/// ignores slope.
#[allow(dead_code)]
pub fn walker_registry() -> (MobilityRegistry, MobilityId) {
    let mut registry = MobilityRegistry::new();
    let id = registry
        .register("walker", 0.0, 0.0, [1.0; TerrainClass::COUNT])
        .expect("register walker");
    (registry, id)
}

/// Flat plain terrain spanning [-600, 600) on both ground axes.
#[allow(dead_code)]
pub fn open_field() -> GridTerrain {
    GridTerrain::flat([-600.0, -600.0], 10.0, 120, 120, TerrainClass::Plain)
}

#[allow(dead_code)]
pub fn open_field_world(terrain: Arc<GridTerrain>) -> (NavigationWorld, MobilityId) {
    let (registry, walker) = walker_registry();
    let world = NavigationWorld::new(terrain, registry, &[], NavConfig::default())
        .expect("open field world builds");
    (world, walker)
}
