//! Transparency module for the agent.
//!
//! Exposes what the agent has been collecting, as counts only.

pub mod log;

// Re-export commonly used types
pub use log::{create_shared_stats, CollectionStats, SharedCollectionStats, StatsSnapshot};
