mod common;

use std::sync::Arc;

use fieldnav_lib::{
    GridTerrain, MovementMode, NavConfig, NavigationWorld, Obstacle, Position, RegionShape,
    RegionSpec, TerrainClass, FOREVER,
};

use common::{fixture_registry, open_field, open_field_world, river_world};

#[test]
fn open_field_route_costs_its_length() {
    let (world, walker) = open_field_world(Arc::new(open_field()));
    let destination = Position::new(500.0, 0.0, 0.0);

    let result = world.find_path(Position::ZERO, destination, walker, 0.0, MovementMode::Fast);

    assert_eq!(result.path[0].position, destination);
    assert!((result.cost - 500.0).abs() < 1.0, "cost {}", result.cost);
}

#[test]
fn destination_outside_map_returns_destination_only() {
    let (world, walker) = open_field_world(Arc::new(open_field()));
    let outside = Position::new(5000.0, 0.0, 0.0);

    for mode in [MovementMode::Fast, MovementMode::Normal, MovementMode::Reverse] {
        let result = world.find_path(Position::ZERO, outside, walker, 0.0, mode);
        assert_eq!(result.path.len(), 1);
        assert_eq!(result.path[0].position, outside);
        assert_eq!(result.cost, FOREVER);
    }
}

#[test]
fn never_worse_than_direct_local_path() {
    let mut terrain = open_field();
    terrain.add_obstacle(Obstacle::new(Position::new(150.0, 0.0, 0.0), 60.0));
    let terrain = Arc::new(terrain);
    let (world, walker) = open_field_world(Arc::clone(&terrain));
    let profile = world.registry().get(walker).expect("walker").clone();

    let start = Position::new(-200.0, 0.0, 20.0);
    for destination in [
        Position::new(400.0, 0.0, 0.0),
        Position::new(300.0, 0.0, -250.0),
        Position::new(-100.0, 0.0, 350.0),
    ] {
        let direct = world.stepper().find_local_path(
            terrain.as_ref(),
            start,
            destination,
            &profile,
            0.0,
        );
        let result = world.find_path(start, destination, walker, 0.0, MovementMode::Fast);
        assert!(
            result.cost <= direct,
            "{destination}: {} > direct {direct}",
            result.cost
        );
        assert_eq!(result.path[0].position, destination);
    }
}

#[test]
fn careful_mode_takes_direct_path_when_one_exists() {
    let (world, walker) = open_field_world(Arc::new(open_field()));
    let destination = Position::new(-300.0, 0.0, 250.0);

    let result = world.find_path(Position::ZERO, destination, walker, 0.0, MovementMode::Normal);

    assert!(result.is_direct());
    assert!(result.cost.is_finite());
}

#[test]
fn tank_crosses_river_by_the_bridge() {
    let world = river_world();
    let tank = world.registry().resolve("tank").expect("tank").id;
    let start = Position::new(300.0, 0.0, 750.0);
    let destination = Position::new(700.0, 0.0, 750.0);

    let result = world.find_path(start, destination, tank, 3.0, MovementMode::Fast);

    assert!(result.is_reachable(), "tank reaches the far bank");
    assert!(!result.is_direct());
    assert_eq!(result.path[0].position, destination);
    let interior = &result.path[1..];
    assert!(interior.iter().all(|entry| entry.node.is_some()));
    assert!(interior
        .iter()
        .any(|entry| entry.position.ground_distance_to(&Position::new(500.0, 0.0, 500.0)) < 20.0));
    let nearest_start = result.path.last().expect("entry");
    assert!(nearest_start.position.ground_distance_to(&start) < 300.0);
}

#[test]
fn infantry_may_wade_when_it_is_quicker() {
    let world = river_world();
    let infantry = world.registry().resolve("infantry").expect("infantry");
    let start = Position::new(300.0, 0.0, 750.0);
    let destination = Position::new(700.0, 0.0, 750.0);

    let direct = world.stepper().find_local_path(
        world.terrain(),
        start,
        destination,
        infantry,
        1.0,
    );
    assert!(direct.is_finite());
    let result = world.find_path(start, destination, infantry.id, 1.0, MovementMode::Fast);
    assert!(result.cost <= direct);
}

fn paint(terrain: &mut GridTerrain, class: TerrainClass, min: [f32; 2], max: [f32; 2]) {
    terrain.paint_region(&RegionSpec {
        class,
        shape: RegionShape::Rect { min, max },
    });
}

/// Plain ground in the west, forest from x = 700 east, and a building pocket
/// around (250, 300) that only opens to the west.
fn forest_edge_world() -> NavigationWorld {
    let mut terrain = GridTerrain::flat([0.0, 0.0], 10.0, 120, 60, TerrainClass::Plain);
    paint(&mut terrain, TerrainClass::Forest, [700.0, 0.0], [1200.0, 600.0]);
    paint(&mut terrain, TerrainClass::Building, [290.0, 240.0], [300.0, 360.0]);
    paint(&mut terrain, TerrainClass::Building, [200.0, 350.0], [300.0, 360.0]);
    paint(&mut terrain, TerrainClass::Building, [200.0, 240.0], [300.0, 250.0]);
    NavigationWorld::new(
        Arc::new(terrain),
        fixture_registry(),
        &[],
        NavConfig::default(),
    )
    .expect("forest edge world builds")
}

#[test]
fn fast_route_finishes_from_a_node_beyond_arc_reach() {
    let world = forest_edge_world();
    let tank = world.registry().resolve("tank").expect("tank");
    let start = Position::new(250.0, 0.0, 300.0);
    let destination = Position::new(1100.0, 0.0, 300.0);

    let direct = world
        .stepper()
        .find_local_path(world.terrain(), start, destination, tank, 0.0);
    assert_eq!(direct, FOREVER, "the pocket blocks the straight walk");
    {
        let graphs = world.graphs();
        let nearest = graphs
            .fast
            .nodes()
            .iter()
            .map(|node| node.position.ground_distance_to(&destination))
            .fold(f32::INFINITY, f32::min);
        assert!(nearest > world.config().max_arc_distance, "nearest node {nearest}");
    }

    let result = world.find_path(start, destination, tank.id, 0.0, MovementMode::Fast);

    assert!(result.is_reachable(), "cost {}", result.cost);
    assert!(!result.is_direct());
    assert_eq!(result.path[0].position, destination);
    let last_node = result.path[1];
    assert!(last_node.node.is_some());
    assert!(last_node.position.ground_distance_to(&destination) > world.config().max_arc_distance);
}
