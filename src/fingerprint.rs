//! Device fingerprint source.
//!
//! How the identifier is derived is up to the platform; the agent only
//! displays whatever text the source returns.

use std::path::PathBuf;

/// Shown when no identifier can be read.
pub const FINGERPRINT_UNAVAILABLE: &str = "unavailable";

/// Produces the fingerprint text shown at the top of the screen.
pub trait FingerprintSource: Send + Sync {
    fn fingerprint(&self) -> Option<String>;
}

/// Lower-case hex of the host's machine id.
#[derive(Debug, Clone)]
pub struct MachineIdFingerprint {
    candidates: Vec<PathBuf>,
}

impl MachineIdFingerprint {
    pub fn new() -> Self {
        Self {
            candidates: vec![
                PathBuf::from("/etc/machine-id"),
                PathBuf::from("/var/lib/dbus/machine-id"),
            ],
        }
    }

    /// Read the id from `path` instead of the system locations.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            candidates: vec![path.into()],
        }
    }
}

impl Default for MachineIdFingerprint {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintSource for MachineIdFingerprint {
    fn fingerprint(&self) -> Option<String> {
        self.candidates.iter().find_map(|path| {
            let raw = std::fs::read_to_string(path).ok()?;
            let id = raw.trim();
            if id.is_empty() {
                None
            } else {
                Some(bytes_to_hex(id.as_bytes()))
            }
        })
    }
}

/// Fingerprint text for display, falling back to a placeholder.
pub fn fingerprint_text(source: &dyn FingerprintSource) -> String {
    source.fingerprint().unwrap_or_else(|| {
        tracing::warn!("Device fingerprint unavailable");
        FINGERPRINT_UNAVAILABLE.to_string()
    })
}

pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<&'static str>);

    impl FingerprintSource for Fixed {
        fn fingerprint(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    #[test]
    fn test_bytes_to_hex() {
        assert_eq!(bytes_to_hex(&[0x00, 0xab, 0x10, 0xff]), "00ab10ff");
        assert_eq!(bytes_to_hex(&[]), "");
    }

    #[test]
    fn test_machine_id_from_file() {
        let path = std::env::temp_dir().join(format!("dfp-agent-machine-id-{}", std::process::id()));
        std::fs::write(&path, "ab\n").unwrap();
        let source = MachineIdFingerprint::from_path(&path);
        assert_eq!(source.fingerprint().as_deref(), Some("6162"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_machine_id() {
        let source = MachineIdFingerprint::from_path("/nonexistent/dfp-agent/machine-id");
        assert!(source.fingerprint().is_none());
        assert_eq!(fingerprint_text(&source), FINGERPRINT_UNAVAILABLE);
    }

    #[test]
    fn test_fingerprint_text_passthrough() {
        assert_eq!(fingerprint_text(&Fixed(Some("cafe"))), "cafe");
    }
}
