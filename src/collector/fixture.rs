//! File-backed radio and location source.
//!
//! Reads a JSON document on every query so it can be edited while the agent
//! runs:
//!
//! ```json
//! {
//!   "location_service": true,
//!   "fixes": [{ "provider": "gps", "latitude": 31.23, "longitude": 121.47 }],
//!   "live_fixes": [{ "provider": "network", "latitude": 31.24, "longitude": 121.48 }],
//!   "cells": [{ "radio": "LTE", "mcc": "460", "mnc": "01", "cid": 1, "lac": 2, "signal_dbm": -90 }]
//! }
//! ```
//!
//! Timestamps may be omitted, in which case the read time is used. Entries of
//! `live_fixes` answer live fix requests and are stamped with the request
//! time. `location_service` defaults to true.

use crate::collector::base_station::{Batch, CellScanner, StreamError};
use crate::collector::snapshot::{FixSink, LocationSource};
use crate::collector::types::{BaseStationRecord, FixProvider, LocationFix};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Contents of a fixture file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default = "default_location_service")]
    pub location_service: bool,
    #[serde(default)]
    pub fixes: Vec<LocationFix>,
    #[serde(default)]
    pub live_fixes: Vec<LocationFix>,
    #[serde(default)]
    pub cells: Vec<BaseStationRecord>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            location_service: default_location_service(),
            fixes: Vec::new(),
            live_fixes: Vec::new(),
            cells: Vec::new(),
        }
    }
}

fn default_location_service() -> bool {
    true
}

/// Errors reading a fixture file.
#[derive(Debug)]
pub enum FixtureError {
    IoError(String),
    ParseError(String),
}

impl std::fmt::Display for FixtureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixtureError::IoError(e) => write!(f, "IO error: {e}"),
            FixtureError::ParseError(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for FixtureError {}

/// Cell scanner and location source backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    path: PathBuf,
}

impl FixtureSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the fixture file.
    pub fn load(&self) -> Result<Fixture, FixtureError> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| FixtureError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| FixtureError::ParseError(e.to_string()))
    }
}

impl CellScanner for FixtureSource {
    fn availability(&self) -> Result<(), String> {
        if self.path.exists() {
            Ok(())
        } else {
            Err(format!("fixture {} not found", self.path.display()))
        }
    }

    fn scan(&self) -> Result<Batch, StreamError> {
        self.load()
            .map(|fixture| fixture.cells)
            .map_err(|e| StreamError::Scan(e.to_string()))
    }
}

impl LocationSource for FixtureSource {
    fn is_service_available(&self) -> bool {
        match self.load() {
            Ok(fixture) => fixture.location_service,
            Err(e) => {
                tracing::debug!("Location fixture unreadable: {e}");
                false
            }
        }
    }

    fn last_known(&self, provider: FixProvider) -> Option<LocationFix> {
        self.load()
            .ok()?
            .fixes
            .into_iter()
            .filter(|fix| fix.provider == provider)
            .max_by_key(|fix| fix.timestamp)
    }

    fn request_single_update(&self, provider: FixProvider, sink: &FixSink) {
        let Ok(fixture) = self.load() else {
            return;
        };
        if let Some(mut fix) = fixture
            .live_fixes
            .into_iter()
            .find(|fix| fix.provider == provider)
        {
            fix.timestamp = Utc::now();
            sink.deliver(fix);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::snapshot::{CachedLocationInfo, LocationInfoProvider};
    use crate::collector::types::RadioType;

    fn write_fixture(name: &str, json: &str) -> FixtureSource {
        let path = std::env::temp_dir().join(format!("dfp-agent-fixture-{name}-{}.json", std::process::id()));
        std::fs::write(&path, json).unwrap();
        FixtureSource::new(path)
    }

    #[test]
    fn test_scan_reads_cells() {
        let source = write_fixture(
            "cells",
            r#"{"cells":[{"radio":"GSM","cid":10,"lac":20,"signal_dbm":-70},{"radio":"LTE","mcc":"460","mnc":"00","cid":11,"lac":21,"signal_dbm":-99}]}"#,
        );
        let cells = source.scan().unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].radio, RadioType::Gsm);
        assert_eq!(cells[1].mcc.as_deref(), Some("460"));
        let _ = std::fs::remove_file(source.path());
    }

    #[test]
    fn test_location_fixes_by_provider() {
        let source = write_fixture(
            "fixes",
            r#"{"location_service":true,"fixes":[{"provider":"network","latitude":1.0,"longitude":2.0}]}"#,
        );
        assert!(source.is_service_available());
        assert!(source.last_known(FixProvider::Gps).is_none());
        let fix = source.last_known(FixProvider::Network).unwrap();
        assert_eq!(fix.latitude, 1.0);
        let _ = std::fs::remove_file(source.path());
    }

    #[test]
    fn test_location_service_defaults_on() {
        let source = write_fixture(
            "implicit",
            r#"{"fixes":[{"provider":"gps","latitude":3.0,"longitude":4.0}]}"#,
        );
        assert!(source.is_service_available());
        assert!(Fixture::default().location_service);
        let _ = std::fs::remove_file(source.path());
    }

    #[tokio::test]
    async fn test_live_fix_delivered_on_request() {
        let source = write_fixture(
            "live",
            r#"{"live_fixes":[{"provider":"network","latitude":5.0,"longitude":6.0,"timestamp":"2020-01-01T00:00:00Z"}]}"#,
        );
        let provider = CachedLocationInfo::new(source.clone());
        assert_eq!(provider.fetch_location_info(), "Latitude: 5, Longitude: 6");
        let _ = std::fs::remove_file(source.path());
    }

    #[test]
    fn test_missing_file() {
        let source = FixtureSource::new("/nonexistent/dfp-agent/fixture.json");
        assert!(source.availability().is_err());
        assert!(matches!(source.scan(), Err(StreamError::Scan(_))));
        assert!(!source.is_service_available());
    }

    #[test]
    fn test_malformed_file() {
        let source = write_fixture("bad", "{ not json");
        assert!(matches!(source.load(), Err(FixtureError::ParseError(_))));
        let _ = std::fs::remove_file(source.path());
    }
}
