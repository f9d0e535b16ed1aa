//! `simulate` command handler.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use fieldnav_cli::inputs::Inputs;
use fieldnav_cli::output::{render_simulation, AgentOutcome};
use fieldnav_lib::{
    Agent, InfantryMovement, MovementMode, MovementStrategy, Position, VehicleMovement,
};

/// How long each agent may wait for its first route before moving off on the
/// straight-line fallback.
const ROUTE_WAIT: Duration = Duration::from_secs(10);

/// Arguments for the simulate command.
#[derive(Debug, Clone)]
pub struct SimulateArgs {
    pub terrain: PathBuf,
    pub mobility: PathBuf,
    pub unit: String,
    pub from: Position,
    pub to: Position,
    pub agents: usize,
    pub max_ticks: usize,
    pub dt: f32,
    pub speed: f32,
    pub turn_rate: Option<f32>,
    pub radius: f32,
}

/// Handle the simulate subcommand.
pub fn handle_simulate(args: &SimulateArgs, config: Option<&Path>) -> Result<()> {
    if args.agents == 0 {
        bail!("--agents must be at least 1");
    }
    if !(args.dt > 0.0 && args.dt.is_finite()) {
        bail!("--dt must be a positive number of seconds");
    }

    let inputs = Inputs::load(&args.terrain, &args.mobility, config)?;
    let mobility = inputs
        .registry
        .resolve(&args.unit)
        .context("unknown --unit")?
        .id;
    let spacing = inputs.config.step_size.max(args.radius * 2.0);
    let graphs = inputs.graphs(None)?;
    let world = inputs.into_world(graphs)?;

    let mut agents = Vec::with_capacity(args.agents);
    for index in 0..args.agents {
        let start = args.from + Position::new(0.0, 0.0, spacing * index as f32);
        let pathfinder = world
            .create_pathfinder(mobility, args.radius)
            .context("failed to create pathfinder")?;
        let strategy: Box<dyn MovementStrategy> = match args.turn_rate {
            Some(rate) => Box::new(VehicleMovement::new(args.speed, rate)),
            None => Box::new(InfantryMovement::new(args.speed)),
        };
        let mut agent = Agent::new(start, strategy, pathfinder);
        agent.order(args.to, MovementMode::Fast);
        agents.push(agent);
    }

    for (index, agent) in agents.iter().enumerate() {
        if !agent.pathfinder().wait_for_route(ROUTE_WAIT) {
            warn!(agent = index, "route not ready; starting on the direct heading");
        }
    }

    let mut arrived_at = vec![None; agents.len()];
    let mut ticks = 0;
    while ticks < args.max_ticks && arrived_at.iter().any(Option::is_none) {
        ticks += 1;
        let now = f64::from(args.dt) * ticks as f64;
        for (index, agent) in agents.iter_mut().enumerate() {
            if arrived_at[index].is_some() {
                continue;
            }
            agent.tick(now, args.dt);
            if agent.is_done() {
                debug!(agent = index, tick = ticks, "agent arrived");
                arrived_at[index] = Some(ticks);
            }
        }
    }

    let outcomes: Vec<AgentOutcome> = agents
        .iter()
        .zip(&arrived_at)
        .enumerate()
        .map(|(index, (agent, arrived))| AgentOutcome {
            index,
            position: agent.position().to_array(),
            arrived_at: *arrived,
            stuck: agent.pathfinder().is_stuck(),
        })
        .collect();
    info!(
        agents = outcomes.len(),
        arrived = outcomes.iter().filter(|o| o.arrived_at.is_some()).count(),
        ticks,
        "simulation finished"
    );
    print!("{}", render_simulation(&outcomes, ticks));
    Ok(())
}
