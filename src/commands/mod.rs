//! Command handlers module.
//!
//! This module organizes the CLI command implementations into separate files:
//! - `core.rs`: Capture, ingest, search, show, cluster and status
//! - `patterns.rs`: Critical pattern listing, demotion and required reading
//! - `config.rs`: Configuration display command
//! - `transcript.rs`: Transcript file loading

mod config;
mod core;
mod patterns;
mod transcript;

// Re-export command functions
pub use config::cmd_config;
pub use core::{cmd_capture, cmd_cluster, cmd_ingest, cmd_search, cmd_show, cmd_status};
pub use patterns::{cmd_context, cmd_demote, cmd_patterns};
