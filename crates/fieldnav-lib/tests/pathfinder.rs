mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use fieldnav_lib::{
    Agent, GridTerrain, InfantryMovement, MobilityId, MobilityRegistry, MovementMode, NavConfig,
    NavigationWorld, Obstacle, Position, Road, TerrainClass, VehicleMovement,
};

use common::{open_field, open_field_world, river_world};

const ROUTE_TIMEOUT: Duration = Duration::from_secs(10);

fn run_until_done(agent: &mut Agent, dt: f32, max_ticks: usize) -> usize {
    let mut now = 0.0f64;
    for tick in 0..max_ticks {
        if agent.is_done() {
            return tick;
        }
        now += f64::from(dt);
        agent.tick(now, dt);
    }
    max_ticks
}

#[test]
fn infantry_reaches_destination_on_open_field() {
    let (world, walker) = open_field_world(Arc::new(open_field()));
    let pathfinder = world.create_pathfinder(walker, 1.0).expect("pathfinder");
    let mut agent = Agent::new(Position::ZERO, Box::new(InfantryMovement::new(10.0)), pathfinder);
    let destination = Position::new(500.0, 0.0, 0.0);

    agent.order(destination, MovementMode::Fast);
    assert!(agent.pathfinder().has_destination());
    assert!(!agent.is_done());
    assert!(agent.pathfinder().wait_for_route(ROUTE_TIMEOUT));

    let ticks = run_until_done(&mut agent, 0.1, 5_000);
    assert!(agent.is_done(), "agent stopped at {}", agent.position());
    assert!(ticks < 5_000);
    assert!(agent.position().ground_distance_to(&destination) <= world.config().final_completion_dist);
    assert!(!agent.pathfinder().has_destination());
}

#[test]
fn tank_follows_route_over_the_bridge() {
    let world = river_world();
    let tank = world.registry().resolve("tank").expect("tank").id;
    let pathfinder = world.create_pathfinder(tank, 3.0).expect("pathfinder");
    let start = Position::new(300.0, 0.0, 750.0);
    let destination = Position::new(700.0, 0.0, 750.0);
    let mut agent = Agent::new(start, Box::new(VehicleMovement::new(10.0, 1.5)), pathfinder);

    agent.order(destination, MovementMode::Fast);
    assert!(agent.pathfinder().wait_for_route(ROUTE_TIMEOUT));
    assert!(agent.pathfinder().path().len() > 1, "route goes through the graph");

    let mut now = 0.0f64;
    let mut crossed_on_bridge = false;
    for _ in 0..10_000 {
        if agent.is_done() {
            break;
        }
        now += 0.1;
        agent.tick(now, 0.1);
        let position = agent.position();
        if (480.0..=520.0).contains(&position.x) {
            assert!(
                (position.z - 500.0).abs() <= 10.0,
                "tank left the bridge deck at {position}"
            );
            crossed_on_bridge = true;
        }
    }

    assert!(agent.is_done(), "tank stopped at {}", agent.position());
    assert!(crossed_on_bridge);
}

#[test]
fn enclosed_agent_reports_stuck() {
    let terrain = Arc::new(open_field());
    let (world, walker) = open_field_world(Arc::clone(&terrain));
    let mut pathfinder = world.create_pathfinder(walker, 1.0).expect("pathfinder");
    let position = Position::ZERO;

    pathfinder.set_destination(position, Position::new(200.0, 0.0, 0.0), MovementMode::Fast);
    assert!(pathfinder.wait_for_route(ROUTE_TIMEOUT));

    let ring = (0..36)
        .map(|k| {
            let angle = (k as f32 * 10.0).to_radians();
            Obstacle::new(Position::new(8.0 * angle.cos(), 0.0, 8.0 * angle.sin()), 2.0)
        })
        .collect();
    terrain.set_dynamic_obstacles(ring);

    assert_eq!(pathfinder.get_next_waypoint(position, 1.0), None);
    assert!(pathfinder.is_stuck());
    assert_eq!(pathfinder.mode(), MovementMode::Normal);
    assert!(!pathfinder.are_orders_complete());
    assert!(pathfinder.has_destination());

    terrain.set_dynamic_obstacles(Vec::new());
    assert!(pathfinder.get_next_waypoint(position, 2.0).is_some());
    assert!(!pathfinder.is_stuck());
}

/// Open field with a road along z = 0. The only profile is twice as fast on
/// the road as off it, so long routes follow the road nodes.
fn road_field(terrain: &mut GridTerrain) -> (Vec<Road>, MobilityRegistry, MobilityId) {
    let road = Road {
        width: 12.0,
        vertices: vec![Position::new(-500.0, 0.0, 0.0), Position::new(500.0, 0.0, 0.0)],
    };
    terrain.paint_road(&road);

    let mut factors = [1.0; TerrainClass::COUNT];
    factors[TerrainClass::Plain.index()] = 0.5;
    let mut registry = MobilityRegistry::new();
    let rider = registry
        .register("rider", 0.0, 0.0, factors)
        .expect("register rider");
    (vec![road], registry, rider)
}

/// Half ring of small obstacles ahead of `center`, open toward `-heading`.
fn cup_facing(center: Position, heading: f32) -> Vec<Obstacle> {
    (0..=18)
        .map(|k| {
            let angle = heading + (k as f32 * 10.0 - 90.0).to_radians();
            Obstacle::new(
                Position::new(center.x + 8.0 * angle.cos(), 0.0, center.z + 8.0 * angle.sin()),
                2.0,
            )
        })
        .collect()
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + ROUTE_TIMEOUT;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

#[test]
fn blocked_interior_arc_is_repaired_after_recovery() {
    let mut terrain = open_field();
    let (roads, registry, rider) = road_field(&mut terrain);
    let terrain = Arc::new(terrain);
    let world = NavigationWorld::new(terrain.clone(), registry, &roads, NavConfig::default())
        .expect("road field world builds");
    let mut pathfinder = world.create_pathfinder(rider, 1.0).expect("pathfinder");

    let start = Position::new(-480.0, 0.0, 30.0);
    pathfinder.set_destination(start, Position::new(480.0, 0.0, 30.0), MovementMode::Fast);
    assert!(pathfinder.wait_for_route(ROUTE_TIMEOUT));
    assert!(pathfinder.get_next_waypoint(start, 0.0).is_some());

    let path = pathfinder.path().to_vec();
    assert!(path.len() >= 3, "route follows the road: {path:?}");
    let previous = path[path.len() - 1];
    let target = path[path.len() - 2];
    let (a, b) = match (previous.node, target.node) {
        (Some(a), Some(b)) => (a, b),
        _ => panic!("route ends in graph nodes: {path:?}"),
    };
    let original = world
        .graphs()
        .fast
        .arc_between(a, b)
        .expect("arc between consecutive route nodes")
        .time(rider);

    // Reach the first node so it becomes the previous node.
    assert!(pathfinder.get_next_waypoint(previous.position, 1.0).is_some());
    assert_eq!(pathfinder.path().len(), path.len() - 1);

    // A quarter of the way along, something closes in around the agent on
    // every side but the one it came from.
    let blocked_at = previous.position.lerp(&target.position, 0.25);
    let heading = (target.position.z - previous.position.z)
        .atan2(target.position.x - previous.position.x);
    terrain.set_dynamic_obstacles(cup_facing(blocked_at, heading));

    let waypoint = pathfinder.get_next_waypoint(blocked_at, 2.0);
    assert!(waypoint.is_some(), "recovery hands out a new waypoint");
    assert!(!pathfinder.is_stuck());
    assert_eq!(pathfinder.mode(), MovementMode::Fast);

    let repaired = wait_until(|| {
        match world.graphs().fast.arc_between(a, b) {
            None => true,
            Some(arc) => arc.time(rider) > original + 1.0,
        }
    });
    assert!(repaired, "arc {}-{} was not repriced", a.0, b.0);
}

#[test]
fn waypoint_is_throttled() {
    let (world, walker) = open_field_world(Arc::new(open_field()));
    let mut pathfinder = world.create_pathfinder(walker, 1.0).expect("pathfinder");
    pathfinder.set_destination(Position::ZERO, Position::new(300.0, 0.0, 0.0), MovementMode::Fast);
    assert!(pathfinder.wait_for_route(ROUTE_TIMEOUT));

    let first = pathfinder.get_next_waypoint(Position::ZERO, 1.0);
    assert!(first.is_some());
    // Within the interval the cached waypoint is returned even if the agent
    // has moved.
    let cached = pathfinder.get_next_waypoint(Position::new(50.0, 0.0, 0.0), 1.1);
    assert_eq!(cached, first);
}

#[test]
fn cancel_clears_orders_on_next_recompute() {
    let (world, walker) = open_field_world(Arc::new(open_field()));
    let mut pathfinder = world.create_pathfinder(walker, 1.0).expect("pathfinder");
    let here = Position::new(10.0, 0.0, 10.0);

    pathfinder.set_destination(here, Position::new(400.0, 0.0, 100.0), MovementMode::Fast);
    pathfinder.cancel(here);
    assert!(!pathfinder.is_route_pending());

    assert_eq!(pathfinder.get_next_waypoint(here, 0.5), None);
    assert!(pathfinder.are_orders_complete());
    assert!(!pathfinder.has_destination());

    // A result for the cancelled order must not resurrect it.
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(pathfinder.get_next_waypoint(here, 1.0), None);
    assert!(pathfinder.are_orders_complete());
}

#[test]
fn disposed_pathfinder_ignores_late_results() {
    let (world, walker) = open_field_world(Arc::new(open_field()));
    let mut pathfinder = world.create_pathfinder(walker, 1.0).expect("pathfinder");

    pathfinder.set_destination(Position::ZERO, Position::new(450.0, 0.0, 300.0), MovementMode::Fast);
    pathfinder.dispose();
    assert!(pathfinder.wait_for_route(ROUTE_TIMEOUT));

    assert_eq!(pathfinder.get_next_waypoint(Position::ZERO, 1.0), None);
    assert!(!pathfinder.has_destination());
    assert!(pathfinder.are_orders_complete());

    pathfinder.set_destination(Position::ZERO, Position::new(10.0, 0.0, 0.0), MovementMode::Fast);
    assert!(!pathfinder.has_destination());
}

#[test]
fn many_agents_share_one_worker() {
    let (world, walker) = open_field_world(Arc::new(open_field()));
    let mut agents: Vec<Agent> = (0..8)
        .map(|i| {
            let start = Position::new(-400.0, 0.0, -300.0 + i as f32 * 80.0);
            let pathfinder = world.create_pathfinder(walker, 1.0).expect("pathfinder");
            Agent::new(start, Box::new(InfantryMovement::new(20.0)), pathfinder)
        })
        .collect();

    for (i, agent) in agents.iter_mut().enumerate() {
        agent.order(Position::new(400.0, 0.0, 300.0 - i as f32 * 80.0), MovementMode::Fast);
    }
    for agent in &agents {
        assert!(agent.pathfinder().wait_for_route(ROUTE_TIMEOUT));
    }
    for agent in &mut agents {
        run_until_done(agent, 0.1, 5_000);
        assert!(agent.is_done(), "agent stopped at {}", agent.position());
    }
}
