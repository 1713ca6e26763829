//! Core functionality for the agent.
//!
//! This module contains:
//! - The observable screen state and its publisher
//! - The collection orchestrator that drives permission gating, the
//!   base-station stream and the periodic location refresh

pub mod orchestrator;
pub mod state;

// Re-export commonly used types
pub use orchestrator::{
    CollectionOrchestrator, CollectionSession, Collaborators, OrchestratorConfig,
    OrchestratorError, Phase, DEFAULT_REFRESH_INTERVAL, MIN_REFRESH_INTERVAL,
};
pub use state::{ObservableState, StateHandle, StatePublisher};
