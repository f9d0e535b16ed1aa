//! `build-graph` command handler.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use fieldnav_cli::inputs::Inputs;
use fieldnav_cli::output::format_key;
use fieldnav_lib::{default_graph_cache_path, save_graphs};

/// Build both graphs from scratch and write the cache, replacing any file
/// already at the target path.
pub fn handle_build_graph(
    terrain: &Path,
    mobility: &Path,
    config: Option<&Path>,
    output: Option<PathBuf>,
) -> Result<()> {
    let inputs = Inputs::load(terrain, mobility, config)?;
    let target = match output {
        Some(path) => path,
        None => default_graph_cache_path().context("failed to resolve graph cache location")?,
    };

    let key = inputs.key()?;
    let graphs = inputs.build_graphs();
    save_graphs(&target, &graphs, &key)
        .with_context(|| format!("failed to write graph cache to {}", target.display()))?;

    println!(
        "fast graph: {} nodes, {} arcs",
        graphs.fast.len(),
        graphs.fast.arc_count()
    );
    println!(
        "regular graph: {} nodes, {} arcs",
        graphs.regular.len(),
        graphs.regular.arc_count()
    );
    println!("profiles: {}", inputs.registry.len());
    println!("cache key: {}", format_key(&key));
    println!("written to {}", target.display());
    Ok(())
}
