use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use fieldnav_cli::output::OutputFormat;
use fieldnav_lib::{MovementMode, Position};

mod commands;

#[derive(Parser, Debug)]
#[command(author, version, about = "Fieldnav terrain navigation utilities")]
struct Cli {
    /// Navigation tuning overrides (JSON). Missing fields keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build both navigation graphs and write them to the graph cache.
    BuildGraph {
        /// Terrain description (JSON).
        #[arg(long)]
        terrain: PathBuf,
        /// Mobility catalog (CSV).
        #[arg(long)]
        mobility: PathBuf,
        /// Cache file to write. Defaults to the platform cache directory.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run one global search and print the route.
    Route {
        #[arg(long)]
        terrain: PathBuf,
        #[arg(long)]
        mobility: PathBuf,
        /// Mobility profile name from the catalog.
        #[arg(long)]
        unit: String,
        /// Start position as x,y,z.
        #[arg(long = "from", allow_hyphen_values = true)]
        from: Position,
        /// Destination as x,y,z.
        #[arg(long = "to", allow_hyphen_values = true)]
        to: Position,
        /// fast, normal or reverse.
        #[arg(long, default_value = "fast")]
        mode: MovementMode,
        /// Agent collision radius used by the local stepper.
        #[arg(long, default_value_t = 0.0)]
        radius: f32,
        /// Graph cache to load from, or write to when stale.
        #[arg(long)]
        cache: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Drive headless agents to a destination through the path worker.
    Simulate {
        #[arg(long)]
        terrain: PathBuf,
        #[arg(long)]
        mobility: PathBuf,
        #[arg(long)]
        unit: String,
        #[arg(long = "from", allow_hyphen_values = true)]
        from: Position,
        #[arg(long = "to", allow_hyphen_values = true)]
        to: Position,
        /// Number of agents, spread out beside the start position.
        #[arg(long, default_value_t = 1)]
        agents: usize,
        #[arg(long, default_value_t = 2000)]
        max_ticks: usize,
        /// Simulated seconds per tick.
        #[arg(long, default_value_t = 0.1)]
        dt: f32,
        /// Ground speed of each agent.
        #[arg(long, default_value_t = 10.0)]
        speed: f32,
        /// Turn rate in radians per second; drives agents as vehicles when set.
        #[arg(long)]
        turn_rate: Option<f32>,
        #[arg(long, default_value_t = 0.0)]
        radius: f32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    let config = cli.config.as_deref();

    match cli.command {
        Command::BuildGraph {
            terrain,
            mobility,
            output,
        } => commands::build_graph::handle_build_graph(&terrain, &mobility, config, output),
        Command::Route {
            terrain,
            mobility,
            unit,
            from,
            to,
            mode,
            radius,
            cache,
            format,
        } => commands::route::handle_route(
            &commands::route::RouteArgs {
                terrain,
                mobility,
                unit,
                from,
                to,
                mode,
                radius,
                cache,
                format,
            },
            config,
        ),
        Command::Simulate {
            terrain,
            mobility,
            unit,
            from,
            to,
            agents,
            max_ticks,
            dt,
            speed,
            turn_rate,
            radius,
        } => commands::simulate::handle_simulate(
            &commands::simulate::SimulateArgs {
                terrain,
                mobility,
                unit,
                from,
                to,
                agents,
                max_ticks,
                dt,
                speed,
                turn_rate,
                radius,
            },
            config,
        ),
    }
}

fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    let _ = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
}
