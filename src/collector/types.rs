//! Telemetry value types produced by the collectors.
//!
//! The orchestrator treats these as opaque display units; only the
//! collectors look inside them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Radio access technology of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RadioType {
    Gsm,
    Lte,
    Wcdma,
    Cdma,
    /// 5G New Radio
    Nr,
}

impl RadioType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RadioType::Gsm => "GSM",
            RadioType::Lte => "LTE",
            RadioType::Wcdma => "WCDMA",
            RadioType::Cdma => "CDMA",
            RadioType::Nr => "NR",
        }
    }
}

impl fmt::Display for RadioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observed base station (cell tower).
///
/// For CDMA cells `mcc` carries the system id, `cid` the base station id and
/// `lac` the network id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseStationRecord {
    /// Radio access technology
    pub radio: RadioType,
    /// Mobile country code
    #[serde(default)]
    pub mcc: Option<String>,
    /// Mobile network code
    #[serde(default)]
    pub mnc: Option<String>,
    /// Cell identity (NR cell ids need 36 bits)
    pub cid: i64,
    /// Location / tracking area code
    pub lac: i32,
    /// Signal strength in dBm
    pub signal_dbm: i32,
    /// When the cell was observed
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl BaseStationRecord {
    pub fn new(radio: RadioType, cid: i64, lac: i32, signal_dbm: i32) -> Self {
        Self {
            radio,
            mcc: None,
            mnc: None,
            cid,
            lac,
            signal_dbm,
            timestamp: Utc::now(),
        }
    }

    /// Attach operator codes.
    pub fn with_operator(mut self, mcc: impl Into<String>, mnc: impl Into<String>) -> Self {
        self.mcc = Some(mcc.into());
        self.mnc = Some(mnc.into());
        self
    }

    /// Multi-line text shown in the base-station list.
    pub fn display_text(&self) -> String {
        format!(
            "{}\nMCC: {} MNC: {}\nCID: {} LAC: {}\nSignal: {} dBm",
            self.radio,
            self.mcc.as_deref().unwrap_or("N/A"),
            self.mnc.as_deref().unwrap_or("N/A"),
            self.cid,
            self.lac,
            self.signal_dbm
        )
    }
}

impl fmt::Display for BaseStationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

/// Where a location fix came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixProvider {
    Gps,
    Network,
}

/// A last-known position reported by a location source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub provider: FixProvider,
    pub latitude: f64,
    pub longitude: f64,
    /// When the fix was taken
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl LocationFix {
    pub fn new(provider: FixProvider, latitude: f64, longitude: f64) -> Self {
        Self {
            provider,
            latitude,
            longitude,
            timestamp: Utc::now(),
        }
    }

    /// Age of the fix relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_text_with_operator() {
        let record = BaseStationRecord::new(RadioType::Lte, 12345, 678, -95).with_operator("460", "01");
        assert_eq!(
            record.display_text(),
            "LTE\nMCC: 460 MNC: 01\nCID: 12345 LAC: 678\nSignal: -95 dBm"
        );
    }

    #[test]
    fn test_display_text_without_operator() {
        let record = BaseStationRecord::new(RadioType::Cdma, 7, 3, -80);
        assert!(record.to_string().contains("MCC: N/A MNC: N/A"));
        assert!(record.to_string().starts_with("CDMA\n"));
    }

    #[test]
    fn test_record_parses_from_json() {
        let json = r#"{"radio":"NR","mcc":"310","mnc":"260","cid":68719476735,"lac":1,"signal_dbm":-101}"#;
        let record: BaseStationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.radio, RadioType::Nr);
        assert_eq!(record.cid, 68_719_476_735);
        assert_eq!(record.mnc.as_deref(), Some("260"));
    }

    #[test]
    fn test_fix_age() {
        let fix = LocationFix::new(FixProvider::Gps, 1.0, 2.0);
        let later = fix.timestamp + chrono::Duration::seconds(12);
        assert_eq!(fix.age(later).num_seconds(), 12);
    }
}
