//! Fieldnav CLI library.
//!
//! Shared pieces of the `fieldnav-cli` binary: loading a terrain, mobility
//! catalog and config from disk, and rendering route and simulation reports.

pub mod inputs;
pub mod output;
