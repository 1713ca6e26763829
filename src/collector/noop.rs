//! Sources for hosts without a cellular modem or location service.
//!
//! These exist so the agent runs anywhere; they simply report nothing.

use crate::collector::base_station::{Batch, CellScanner, StreamError};
use crate::collector::snapshot::LocationSource;
use crate::collector::types::{FixProvider, LocationFix};

/// A scanner that never sees any cells.
#[derive(Debug, Default, Clone)]
pub struct NoopCellScanner;

impl CellScanner for NoopCellScanner {
    fn scan(&self) -> Result<Batch, StreamError> {
        Ok(Vec::new())
    }
}

/// A location service that is always switched off.
#[derive(Debug, Default, Clone)]
pub struct NoopLocationSource;

impl LocationSource for NoopLocationSource {
    fn is_service_available(&self) -> bool {
        false
    }

    fn last_known(&self, _provider: FixProvider) -> Option<LocationFix> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::snapshot::{CachedLocationInfo, LocationInfoProvider, LOCATION_SERVICE_UNAVAILABLE};

    #[test]
    fn test_noop_scanner_is_empty() {
        assert!(NoopCellScanner.availability().is_ok());
        assert_eq!(NoopCellScanner.scan(), Ok(Vec::new()));
    }

    #[tokio::test]
    async fn test_noop_location_reports_service_off() {
        let provider = CachedLocationInfo::new(NoopLocationSource);
        assert_eq!(provider.fetch_location_info(), LOCATION_SERVICE_UNAVAILABLE);
    }
}
