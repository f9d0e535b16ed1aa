//! On-disk cache for built navigation graphs.
//!
//! Pricing every arc for every mobility profile is the expensive part of
//! loading a map, so built graphs are written next to the other per-user
//! cache files and reused while the world they were built from is unchanged.
//!
//! # Serialization Format
//!
//! ```text
//! Header (52 bytes):
//!   - Magic: b"FNGC" (4 bytes)
//!   - Version: u8 (1 byte)
//!   - Reserved: 3 bytes
//!   - Profile count: u32 (4 bytes)
//!   - Fast graph node count: u32 (4 bytes)
//!   - Regular graph node count: u32 (4 bytes)
//!   - Content key: SHA-256 of terrain, config and profiles (32 bytes)
//!
//! Body:
//!   - postcard-serialized fast and regular graphs
//!   - zstd compressed
//!
//! Footer (32 bytes):
//!   - SHA-256 checksum of compressed body
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::NavConfig;
use crate::error::{Error, Result};
use crate::graph::{GraphKind, GraphNode, NavArc, NavGraph, NavGraphs};
use crate::mobility::MobilityRegistry;

/// Magic bytes identifying a graph cache file.
const CACHE_MAGIC: &[u8; 4] = b"FNGC";

/// Current cache format version.
const CACHE_VERSION: u8 = 1;

/// Header size in bytes.
const HEADER_SIZE: usize = 52;

/// Offset of the content key inside the header.
const KEY_OFFSET: usize = 20;

/// Checksum size in bytes (SHA-256).
const CHECKSUM_SIZE: usize = 32;

/// zstd compression level (balanced speed/ratio).
const COMPRESSION_LEVEL: i32 = 3;

/// Identifies the inputs a set of graphs was built from.
pub type ContentKey = [u8; 32];

#[derive(Serialize, Deserialize)]
struct StoredGraph {
    nodes: Vec<GraphNode>,
    arcs: Vec<Option<NavArc>>,
}

#[derive(Serialize, Deserialize)]
struct StoredGraphs {
    fast: StoredGraph,
    regular: StoredGraph,
}

impl StoredGraph {
    fn from_graph(graph: &NavGraph) -> Self {
        Self {
            nodes: graph.nodes().to_vec(),
            arcs: graph.arc_slots().to_vec(),
        }
    }

    /// Reject a body that disagrees with its header or with itself. Every
    /// index is checked here so that nothing downstream can go out of bounds.
    fn check(&self, node_count: usize, profile_count: usize) -> std::result::Result<(), String> {
        if self.nodes.len() != node_count {
            return Err(format!(
                "header lists {} nodes, body holds {}",
                node_count,
                self.nodes.len()
            ));
        }

        for (slot, arc) in self.arcs.iter().enumerate() {
            let Some(arc) = arc else { continue };
            if arc.a.index() >= node_count || arc.b.index() >= node_count {
                return Err(format!(
                    "arc {} joins nodes {} and {} of {}",
                    slot, arc.a.0, arc.b.0, node_count
                ));
            }
            if arc.times.len() != profile_count {
                return Err(format!(
                    "arc {} carries {} traversal times, expected {}",
                    slot,
                    arc.times.len(),
                    profile_count
                ));
            }
        }

        for (index, node) in self.nodes.iter().enumerate() {
            if node.id.index() != index {
                return Err(format!("node {} is stored at index {}", node.id.0, index));
            }
            for &slot in &node.arcs {
                let touches = self
                    .arcs
                    .get(slot)
                    .and_then(Option::as_ref)
                    .is_some_and(|arc| arc.a == node.id || arc.b == node.id);
                if !touches {
                    return Err(format!("node {} lists dangling arc slot {}", index, slot));
                }
            }
        }
        Ok(())
    }

    fn into_graph(self, kind: GraphKind, profile_count: usize) -> NavGraph {
        NavGraph::from_parts(kind, self.nodes, self.arcs, profile_count)
    }
}

/// Hash everything graph construction depends on: the world description
/// (terrain and roads), the tuning config and the registered profiles.
pub fn content_key<W: Serialize + ?Sized>(
    world: &W,
    config: &NavConfig,
    registry: &MobilityRegistry,
) -> Result<ContentKey> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(world)?);
    hasher.update(serde_json::to_vec(config)?);
    hasher.update(serde_json::to_vec(registry.profiles())?);
    Ok(hasher.finalize().into())
}

/// Serialize both graphs to `path`, creating parent directories as needed.
pub fn save_graphs(path: &Path, graphs: &NavGraphs, key: &ContentKey) -> Result<()> {
    info!(
        path = %path.display(),
        fast_nodes = graphs.fast.len(),
        regular_nodes = graphs.regular.len(),
        "saving navigation graph cache"
    );

    let stored = StoredGraphs {
        fast: StoredGraph::from_graph(&graphs.fast),
        regular: StoredGraph::from_graph(&graphs.regular),
    };
    let serialized = postcard::to_allocvec(&stored).map_err(|e| Error::GraphCacheSerialize {
        message: format!("postcard serialization failed: {}", e),
    })?;
    let compressed = zstd::encode_all(serialized.as_slice(), COMPRESSION_LEVEL).map_err(|e| {
        Error::GraphCacheSerialize {
            message: format!("zstd compression failed: {}", e),
        }
    })?;
    let checksum = Sha256::digest(&compressed);

    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(CACHE_MAGIC);
    header[4] = CACHE_VERSION;
    // bytes 5-7 reserved
    header[8..12].copy_from_slice(&(graphs.fast.profile_count() as u32).to_le_bytes());
    header[12..16].copy_from_slice(&(graphs.fast.len() as u32).to_le_bytes());
    header[16..20].copy_from_slice(&(graphs.regular.len() as u32).to_le_bytes());
    header[KEY_OFFSET..KEY_OFFSET + 32].copy_from_slice(key);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut bytes = Vec::with_capacity(HEADER_SIZE + compressed.len() + CHECKSUM_SIZE);
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(&compressed);
    bytes.extend_from_slice(&checksum);
    fs::write(path, &bytes)?;

    info!(
        file_size = bytes.len(),
        compressed_size = compressed.len(),
        "navigation graph cache saved"
    );
    Ok(())
}

/// Load graphs from `path`, rejecting files written for different inputs or
/// a different number of mobility profiles.
pub fn load_graphs(path: &Path, key: &ContentKey, profile_count: usize) -> Result<NavGraphs> {
    debug!(path = %path.display(), "loading navigation graph cache");
    let load_error = |message: String| Error::GraphCacheLoad {
        path: path.to_path_buf(),
        message,
    };

    let bytes = fs::read(path).map_err(|e| load_error(format!("failed to read file: {}", e)))?;
    if bytes.len() < HEADER_SIZE + CHECKSUM_SIZE {
        return Err(load_error(format!("file too short ({} bytes)", bytes.len())));
    }

    let (header, rest) = bytes.split_at(HEADER_SIZE);
    let (compressed, stored_checksum) = rest.split_at(rest.len() - CHECKSUM_SIZE);

    if &header[0..4] != CACHE_MAGIC {
        return Err(load_error("invalid magic bytes".to_string()));
    }
    let version = header[4];
    if version != CACHE_VERSION {
        return Err(load_error(format!(
            "unsupported version {} (expected {})",
            version, CACHE_VERSION
        )));
    }

    let stored_profiles = read_u32(header, 8) as usize;
    if stored_profiles != profile_count {
        return Err(Error::GraphCacheMismatch {
            message: format!(
                "cache holds times for {} mobility profiles, {} are registered",
                stored_profiles, profile_count
            ),
        });
    }
    if &header[KEY_OFFSET..KEY_OFFSET + 32] != key.as_slice() {
        return Err(Error::GraphCacheMismatch {
            message: "content key differs".to_string(),
        });
    }

    let computed_checksum = Sha256::digest(compressed);
    if computed_checksum.as_slice() != stored_checksum {
        return Err(load_error(
            "checksum mismatch - file may be corrupted".to_string(),
        ));
    }

    let decompressed = zstd::decode_all(compressed)
        .map_err(|e| load_error(format!("zstd decompression failed: {}", e)))?;
    let stored: StoredGraphs = postcard::from_bytes(&decompressed)
        .map_err(|e| load_error(format!("postcard deserialization failed: {}", e)))?;

    let expected = [
        ("fast", &stored.fast, read_u32(header, 12) as usize),
        ("regular", &stored.regular, read_u32(header, 16) as usize),
    ];
    for (name, graph, node_count) in expected {
        graph
            .check(node_count, profile_count)
            .map_err(|message| Error::GraphCacheMismatch {
                message: format!("{name} graph: {message}"),
            })?;
    }

    let graphs = NavGraphs {
        fast: stored.fast.into_graph(GraphKind::Fast, profile_count),
        regular: stored.regular.into_graph(GraphKind::Regular, profile_count),
    };
    info!(
        fast_nodes = graphs.fast.len(),
        regular_nodes = graphs.regular.len(),
        "loaded navigation graph cache"
    );
    Ok(graphs)
}

/// Load cached graphs when they match `key`, otherwise build them with
/// `build` and write a fresh cache. Failing to write the cache is logged and
/// does not fail the call.
pub fn load_or_build<F>(
    path: &Path,
    key: &ContentKey,
    profile_count: usize,
    build: F,
) -> Result<NavGraphs>
where
    F: FnOnce() -> NavGraphs,
{
    if path.exists() {
        match load_graphs(path, key, profile_count) {
            Ok(graphs) => return Ok(graphs),
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "failed to load navigation graph cache, will rebuild"
            ),
        }
    }

    let graphs = build();
    if let Err(e) = save_graphs(path, &graphs, key) {
        warn!(path = %path.display(), error = %e, "failed to write navigation graph cache");
    }
    Ok(graphs)
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
