mod common;

use fieldnav_lib::{
    GraphBuilder, GridTerrain, LocalStepper, MobilityRegistry, NavConfig, NodeId, Obstacle,
    Position, Road, TerrainClass, TerrainOracle,
};

use common::{fixture_registry, open_field, river_spec, walker_registry};

#[test]
fn long_road_segment_is_densified() {
    let terrain = GridTerrain::flat([0.0, 0.0], 10.0, 250, 20, TerrainClass::Plain);
    let (registry, _) = walker_registry();
    let config = NavConfig::default();
    let builder = GraphBuilder::new(&terrain, &registry, &config);

    let road = Road {
        width: 10.0,
        vertices: vec![
            Position::new(100.0, 0.0, 100.0),
            Position::new(2100.0, 0.0, 100.0),
        ],
    };
    let candidates = builder.road_candidates(&[road]);

    assert_eq!(candidates.len(), 11, "9 intermediate nodes plus 2 endpoints");
    assert!(candidates.iter().all(|c| c.is_road));
    for pair in candidates.windows(2) {
        let gap = pair[0].position.ground_distance_to(&pair[1].position);
        assert!(gap <= config.road_node_spacing + 1e-3, "gap {gap}");
    }
    assert_eq!(candidates[0].position.x, 100.0);
    assert_eq!(candidates[10].position.x, 2100.0);
}

#[test]
fn road_vertices_outside_map_are_skipped() {
    let terrain = GridTerrain::flat([0.0, 0.0], 10.0, 50, 50, TerrainClass::Plain);
    let (registry, _) = walker_registry();
    let config = NavConfig::default();
    let builder = GraphBuilder::new(&terrain, &registry, &config);

    let road = Road {
        width: 10.0,
        vertices: vec![
            Position::new(100.0, 0.0, 100.0),
            Position::new(-50.0, 0.0, 100.0),
        ],
    };
    let candidates = builder.road_candidates(&[road]);
    assert_eq!(candidates.len(), 1);
}

#[test]
fn kept_nodes_respect_minimum_separation() {
    let spec = river_spec();
    let terrain = GridTerrain::from_spec(&spec).expect("terrain");
    let registry = fixture_registry();
    let config = NavConfig {
        min_node_separation: 120.0,
        ..NavConfig::default()
    };
    let graphs = GraphBuilder::new(&terrain, &registry, &config).build(&spec.roads);

    let nodes = graphs.fast.nodes();
    assert!(!nodes.is_empty());
    for (i, a) in nodes.iter().enumerate() {
        for b in &nodes[i + 1..] {
            let gap = a.position.ground_distance_to(&b.position);
            assert!(gap >= config.min_node_separation, "{} and {} are {gap} apart", a.id.0, b.id.0);
        }
    }
}

#[test]
fn arcs_carry_one_time_per_profile_and_respect_reach() {
    let spec = river_spec();
    let terrain = GridTerrain::from_spec(&spec).expect("terrain");
    let registry = fixture_registry();
    let config = NavConfig::default();
    let graphs = GraphBuilder::new(&terrain, &registry, &config).build(&spec.roads);

    assert!(graphs.fast.arc_count() > 0);
    for arc in graphs.fast.arcs() {
        assert_eq!(arc.times.len(), registry.len());
        let a = graphs.fast.node(arc.a).expect("a").position;
        let b = graphs.fast.node(arc.b).expect("b").position;
        assert!(a.ground_distance_to(&b) <= config.max_arc_distance + config.epsilon);
    }
}

#[test]
fn river_blocks_tanks_but_not_infantry() {
    let spec = river_spec();
    let terrain = GridTerrain::from_spec(&spec).expect("terrain");
    let registry = fixture_registry();
    let config = NavConfig::default();
    let graphs = GraphBuilder::new(&terrain, &registry, &config).build(&spec.roads);
    let tank = registry.resolve("tank").expect("tank").id;
    let infantry = registry.resolve("infantry").expect("infantry").id;

    let across_river = graphs
        .fast
        .arcs()
        .find(|arc| {
            let a = graphs.fast.node(arc.a).expect("a");
            let b = graphs.fast.node(arc.b).expect("b");
            !a.is_road && !b.is_road && (a.position.x - 500.0) * (b.position.x - 500.0) < 0.0
        })
        .expect("open-space arc spanning the river");
    assert!(!across_river.time(tank).is_finite());
    assert!(across_river.time(infantry).is_finite());

    let bridge = graphs
        .fast
        .nodes_within(Position::new(500.0, 0.0, 500.0), 1.0)
        .first()
        .map(|(id, _)| *id)
        .expect("road node on the bridge");
    assert!(graphs
        .fast
        .neighbours(bridge, tank)
        .any(|(_, time)| time.is_finite()));
}

#[test]
fn regular_graph_keeps_road_nodes_near_bridges() {
    let spec = river_spec();
    let terrain = GridTerrain::from_spec(&spec).expect("terrain");
    let registry = fixture_registry();
    let config = NavConfig::default();
    let graphs = GraphBuilder::new(&terrain, &registry, &config).build(&spec.roads);

    assert!(!graphs.regular.is_empty());
    let reach = config.max_arc_distance * 0.5;
    for node in graphs.regular.nodes() {
        assert!(node.is_road);
        assert!(terrain
            .bridges()
            .iter()
            .any(|bridge| bridge.ground_distance_to(&node.position) < reach));
    }
}

#[test]
fn arc_times_do_not_depend_on_direction() {
    let mut terrain = open_field();
    for column in 0..120 {
        for row in 0..120 {
            terrain.set_vertex_height(column, row, (column as f32 * 0.7).sin() * 4.0);
        }
    }

    let mut registry = MobilityRegistry::new();
    let mut factors = [1.0; TerrainClass::COUNT];
    factors[TerrainClass::Water.index()] = 0.0;
    let hiker = registry
        .register("hiker", 0.8, 0.0, factors)
        .expect("register hiker");
    let config = NavConfig::default();
    let graphs = GraphBuilder::new(&terrain, &registry, &config).build(&[]);
    let stepper = LocalStepper::new(&config);
    let profile = registry.get(hiker).expect("profile");

    let mut checked = 0;
    for arc in graphs.fast.arcs() {
        let a = graphs.fast.node(arc.a).expect("a").position;
        let b = graphs.fast.node(arc.b).expect("b").position;
        let forward = arc.time(hiker);
        let backward = stepper.find_local_path(&terrain, b, a, profile, 0.0);
        if !forward.is_finite() || !backward.is_finite() {
            continue;
        }
        let tolerance = 0.05 * forward.max(1.0);
        assert!(
            (forward - backward).abs() <= tolerance,
            "arc {}-{}: {forward} vs {backward}",
            arc.a.0,
            arc.b.0
        );
        checked += 1;
    }
    assert!(checked > 0);
}

#[test]
fn repricing_drops_blocked_arc_and_restores_it() {
    let terrain = open_field();
    let (registry, walker) = walker_registry();
    let config = NavConfig::default();
    let stepper = LocalStepper::new(&config);
    let mut graph = GraphBuilder::new(&terrain, &registry, &config).build(&[]).fast;

    let arc = graph.arcs().next().cloned().expect("an arc");
    let (a, b): (NodeId, NodeId) = (arc.a, arc.b);
    let far_end = graph.node(b).expect("b").position;

    terrain.set_dynamic_obstacles(vec![Obstacle::new(far_end, 10.0)]);
    assert!(!graph.reprice_arc(a, b, &terrain, &registry, &stepper, 1.0));
    assert!(graph.arc_between(a, b).is_none());
    assert!(graph.neighbours(a, walker).all(|(node, _)| node != b));

    terrain.set_dynamic_obstacles(Vec::new());
    assert!(graph.reprice_arc(a, b, &terrain, &registry, &stepper, 0.0));
    let restored = graph.arc_between(b, a).expect("arc restored").time(walker);
    assert!((restored - arc.time(walker)).abs() < 1e-3);
}
