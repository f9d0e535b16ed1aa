// Each module handles one CLI subcommand; main.rs parses and dispatches.

pub mod build_graph;
pub mod route;
pub mod simulate;
