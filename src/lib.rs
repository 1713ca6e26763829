//! dfp-agent - local device fingerprint and telemetry viewer.
//!
//! This library gathers a device fingerprint, hardware and location text,
//! and nearby cellular base stations, and publishes them as observable state
//! for a screen to display. Collection is gated on runtime permissions.
//!
//! # Privacy Guarantees
//!
//! - **Local only**: Values are displayed, never transmitted
//! - **No persistence**: Telemetry lives only as long as the screen
//! - **Permission first**: Nothing is read until every capability is granted
//! - **Transparency**: Every collection step is counted and reportable
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          dfp-agent                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌──────────────┐   ┌─────────────┐       │
//! │  │ Permission  │──▶│ Orchestrator │──▶│ Observable  │       │
//! │  │    Gate     │   │ (30s refresh)│   │   State     │       │
//! │  └─────────────┘   └──────────────┘   └─────────────┘       │
//! │                      ▲          ▲                            │
//! │         ┌────────────┘          └───────────┐                │
//! │  ┌─────────────┐                    ┌─────────────┐          │
//! │  │Base-station │                    │  Snapshot   │          │
//! │  │   Stream    │                    │  Providers  │          │
//! │  └─────────────┘                    └─────────────┘          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dfp_agent::collector::{
//!     CachedLocationInfo, NoopCellScanner, NoopLocationSource, ScheduledBaseStationStream,
//!     SystemHardwareInfo, DEFAULT_SCAN_INTERVAL,
//! };
//! use dfp_agent::core::{CollectionOrchestrator, Collaborators, OrchestratorConfig};
//! use dfp_agent::fingerprint::MachineIdFingerprint;
//! use dfp_agent::permission::StaticPermissionGate;
//!
//! # async fn run() {
//! let orchestrator = CollectionOrchestrator::new(
//!     Collaborators {
//!         gate: Arc::new(StaticPermissionGate::granted()),
//!         stream: Arc::new(ScheduledBaseStationStream::new(NoopCellScanner, DEFAULT_SCAN_INTERVAL)),
//!         hardware: Arc::new(SystemHardwareInfo),
//!         location: Arc::new(CachedLocationInfo::new(NoopLocationSource)),
//!         fingerprint: Arc::new(MachineIdFingerprint::new()),
//!     },
//!     OrchestratorConfig::default(),
//! );
//!
//! orchestrator.evaluate().expect("must run inside a Tokio runtime");
//! println!("{}", orchestrator.state().current().hardware_info);
//! orchestrator.shutdown().await;
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod fingerprint;
pub mod logging;
pub mod permission;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use collector::{BaseStationRecord, BaseStationStream, HardwareInfoProvider, LocationInfoProvider};
pub use config::{CapabilityConfig, Config};
pub use crate::core::{CollectionOrchestrator, Collaborators, ObservableState, OrchestratorConfig, Phase, StateHandle};
pub use permission::{Capability, PermissionGate, PermissionSet};
pub use transparency::{CollectionStats, SharedCollectionStats, StatsSnapshot};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                 DFP AGENT - PRIVACY DECLARATION                  ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This agent shows what a device reveals about itself.            ║
║                                                                  ║
║  ✓ WHAT WE READ (only after you grant permission):               ║
║    • A device identifier, shown as a fingerprint                 ║
║    • Basic hardware and operating system details                 ║
║    • Your last known location, refreshed every 30 seconds        ║
║    • Nearby cellular base stations and their signal strength     ║
║                                                                  ║
║  ✗ WHAT WE NEVER DO:                                             ║
║    • Save any of these values to disk                            ║
║    • Send any of these values over the network                   ║
║    • Match fingerprints or profile you                           ║
║                                                                  ║
║  Everything is discarded when the screen closes.                 ║
║                                                                  ║
║  You can view collection statistics when the agent stops.        ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
