//! Telemetry collection for the agent.
//!
//! Base stations are pushed by a long-lived stream; hardware and location
//! are pulled on demand as text snapshots.

pub mod base_station;
pub mod fixture;
pub mod noop;
pub mod snapshot;
pub mod types;

// Re-export commonly used types
pub use base_station::{
    batch_channel, BaseStationStream, Batch, BatchSender, BatchSubscription, CellScanner,
    ScheduledBaseStationStream, StreamError, DEFAULT_SCAN_INTERVAL, MIN_SCAN_INTERVAL,
};
pub use fixture::{Fixture, FixtureError, FixtureSource};
pub use noop::{NoopCellScanner, NoopLocationSource};
pub use snapshot::{
    CachedLocationInfo, FixSink, HardwareInfoProvider, LocationInfoProvider, LocationSource,
    SystemHardwareInfo, LOCATION_SERVICE_UNAVAILABLE, LOCATION_UNAVAILABLE,
    MIN_LOCATION_REQUEST_INTERVAL,
};
pub use types::{BaseStationRecord, FixProvider, LocationFix, RadioType};
