//! Configuration for the agent.

use crate::core::OrchestratorConfig;
use crate::permission::{Capability, PermissionSet};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Delay between location refreshes
    #[serde(with = "duration_serde")]
    pub refresh_interval: Duration,

    /// Delay between cell scans
    #[serde(with = "duration_serde")]
    pub scan_interval: Duration,

    /// How long a location text is reused before re-reading the source
    #[serde(with = "duration_serde")]
    pub location_cache: Duration,

    /// Maximum age of a last-known fix before it is considered stale
    #[serde(with = "duration_serde")]
    pub fix_max_age: Duration,

    /// Capabilities that must be granted before collection starts
    pub capabilities: CapabilityConfig,

    /// Optional JSON fixture standing in for the radio and location service
    #[serde(default)]
    pub fixture_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            scan_interval: Duration::from_secs(30),
            location_cache: Duration::from_secs(30),
            fix_max_age: Duration::from_secs(10),
            capabilities: CapabilityConfig::default(),
            fixture_path: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dfp-agent")
            .join("config.json")
    }

    /// Orchestrator timing derived from this configuration.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            refresh_interval: self.refresh_interval,
        }
    }
}

/// Which capabilities gate collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityConfig {
    pub phone_state: bool,
    pub fine_location: bool,
    pub coarse_location: bool,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            phone_state: true,
            fine_location: true,
            coarse_location: true,
        }
    }
}

impl CapabilityConfig {
    /// Parse capability configuration from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let names: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();
        let has = |name: &str| names.iter().any(|n| n == name || n == "all");

        Self {
            phone_state: has("phone"),
            fine_location: has("fine"),
            coarse_location: has("coarse"),
        }
    }

    /// The enabled capabilities, in canonical order.
    pub fn permission_set(&self) -> PermissionSet {
        let enabled = [self.phone_state, self.fine_location, self.coarse_location];
        PermissionSet::new(
            Capability::ALL
                .into_iter()
                .zip(enabled)
                .filter_map(|(capability, on)| on.then_some(capability)),
        )
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole, non-zero seconds.
mod duration_serde {
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        if secs == 0 {
            return Err(D::Error::custom("duration must be at least 1 second"));
        }
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_parsing() {
        let caps = CapabilityConfig::from_csv("phone, fine");
        assert!(caps.phone_state);
        assert!(caps.fine_location);
        assert!(!caps.coarse_location);

        let caps = CapabilityConfig::from_csv("all");
        assert_eq!(caps.permission_set(), PermissionSet::default());
    }

    #[test]
    fn test_permission_set_order() {
        let caps = CapabilityConfig::from_csv("coarse,phone");
        let order: Vec<_> = caps.permission_set().iter().copied().collect();
        assert_eq!(order, vec![Capability::ReadPhoneState, Capability::CoarseLocation]);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.fix_max_age, Duration::from_secs(10));
        assert!(config.fixture_path.is_none());
        assert_eq!(
            config.orchestrator_config().refresh_interval,
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_config_json_durations_are_seconds() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["refresh_interval"], 30);

        let parsed: Config = serde_json::from_str(
            r#"{"refresh_interval":5,"scan_interval":6,"location_cache":7,"fix_max_age":8,
                "capabilities":{"phone_state":false,"fine_location":true,"coarse_location":true}}"#,
        )
        .unwrap();
        assert_eq!(parsed.refresh_interval, Duration::from_secs(5));
        assert!(!parsed.capabilities.phone_state);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = serde_json::from_str::<Config>(
            r#"{"refresh_interval":0,"scan_interval":30,"location_cache":30,"fix_max_age":10,
                "capabilities":{"phone_state":true,"fine_location":true,"coarse_location":true}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("at least 1 second"));
    }
}
