use std::path::PathBuf;

use thiserror::Error;

/// Convenient result alias for the navigation library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
///
/// Failing to find a path is not represented here: searches report that as a
/// [`FOREVER`](crate::stepper::FOREVER) cost and agents report it as a
/// missing waypoint.
#[derive(Debug, Error)]
pub enum Error {
    /// Raised when a mobility catalog row or profile fails validation.
    #[error("invalid mobility data: {message}")]
    MobilityValidation { message: String },

    /// Raised when the same unit archetype name is registered twice.
    #[error("duplicate mobility profile name encountered: {name}")]
    DuplicateMobility { name: String },

    /// Raised when a mobility profile name could not be resolved.
    #[error("unknown mobility profile: {name}{}", format_known(.known))]
    UnknownMobility { name: String, known: Vec<String> },

    /// Raised when a terrain description is malformed.
    #[error("invalid terrain description: {message}")]
    TerrainValidation { message: String },

    /// Raised when a tuning value in the navigation config is unusable.
    #[error("invalid navigation config field {field}: {message}")]
    ConfigValidation {
        field: &'static str,
        message: String,
    },

    /// No suitable project directories could be resolved for this platform.
    #[error("failed to resolve cache directories for navigation graphs")]
    CacheDirsUnavailable,

    /// Raised when serializing a navigation graph cache fails.
    #[error("failed to serialize navigation graph cache: {message}")]
    GraphCacheSerialize { message: String },

    /// Raised when a navigation graph cache file cannot be read or decoded.
    #[error("failed to load navigation graph cache from {path}: {message}")]
    GraphCacheLoad { path: PathBuf, message: String },

    /// Raised when a cached graph was built for a different world or a
    /// different set of mobility profiles.
    #[error("navigation graph cache does not match the current world: {message}")]
    GraphCacheMismatch { message: String },

    /// Raised when the background path worker could not be started.
    #[error("path worker failed: {0}")]
    Worker(String),

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapper for JSON parsing errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Wrapper for CSV parsing errors.
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

fn format_known(known: &[String]) -> String {
    if known.is_empty() {
        String::new()
    } else {
        format!(
            ". Known profiles: {}",
            known
                .iter()
                .map(|s| format!("'{}'", s))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}
