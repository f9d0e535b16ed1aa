//! `route` command handler.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use fieldnav_cli::inputs::Inputs;
use fieldnav_cli::output::{OutputFormat, RouteReport};
use fieldnav_lib::{MovementMode, Position};

/// Arguments for the route command.
#[derive(Debug, Clone)]
pub struct RouteArgs {
    pub terrain: PathBuf,
    pub mobility: PathBuf,
    pub unit: String,
    pub from: Position,
    pub to: Position,
    pub mode: MovementMode,
    pub radius: f32,
    pub cache: Option<PathBuf>,
    pub format: OutputFormat,
}

/// Handle the route subcommand. An unreachable destination is reported, not
/// treated as a failure.
pub fn handle_route(args: &RouteArgs, config: Option<&Path>) -> Result<()> {
    let inputs = Inputs::load(&args.terrain, &args.mobility, config)?;
    let mobility = inputs
        .registry
        .resolve(&args.unit)
        .context("unknown --unit")?
        .id;

    let graphs = inputs.graphs(args.cache.as_deref())?;
    let world = inputs.into_world(graphs)?;
    let result = world.find_path(args.from, args.to, mobility, args.radius, args.mode);

    let report = RouteReport::new(&args.unit, args.mode, args.from, args.to, &result);
    let rendered = report
        .render(args.format)
        .context("failed to render route")?;
    print!("{rendered}");
    if args.format == OutputFormat::Json {
        println!();
    }
    Ok(())
}
