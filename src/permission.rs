//! Runtime permission gating.
//!
//! Collection only starts once every required capability is granted. A
//! partial grant counts as no grant at all.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, RwLock};

/// A named runtime permission the host can grant or deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Read phone state (needed for cell scans)
    ReadPhoneState,
    /// Precise location
    FineLocation,
    /// Approximate location
    CoarseLocation,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::ReadPhoneState,
        Capability::FineLocation,
        Capability::CoarseLocation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Capability::ReadPhoneState => "phone state",
            Capability::FineLocation => "fine location",
            Capability::CoarseLocation => "coarse location",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered, duplicate-free set of required capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet(Vec<Capability>);

impl PermissionSet {
    /// Build a set, keeping first-seen order and dropping duplicates.
    pub fn new(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        let mut ordered = Vec::new();
        for capability in capabilities {
            if !ordered.contains(&capability) {
                ordered.push(capability);
            }
        }
        Self(ordered)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }
}

impl Default for PermissionSet {
    fn default() -> Self {
        Self::new(Capability::ALL)
    }
}

/// Outcome of a grant request: true iff at least one flag was reported
/// and every flag is granted.
pub fn grant_outcome(flags: &[bool]) -> bool {
    !flags.is_empty() && flags.iter().all(|granted| *granted)
}

/// Evaluates and requests the required capabilities.
pub trait PermissionGate: Send + Sync {
    /// The capabilities this gate guards.
    fn required(&self) -> &PermissionSet;

    /// True iff every required capability is currently granted. No side effects.
    fn check(&self) -> bool;

    /// Ask the host to prompt the user. The answer arrives later through
    /// [`PermissionGate::on_result`], never as a return value.
    fn request(&self);

    /// Interpret the per-capability flags delivered by the host.
    fn on_result(&self, granted_flags: &[bool]) -> bool {
        grant_outcome(granted_flags)
    }
}

/// Thread-safe record of which capabilities the host has granted.
#[derive(Debug, Default)]
pub struct GrantTable {
    granted: RwLock<BTreeSet<Capability>>,
}

impl GrantTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, capability: Capability) {
        self.write().insert(capability);
    }

    pub fn revoke(&self, capability: Capability) {
        self.write().remove(&capability);
    }

    pub fn is_granted(&self, capability: Capability) -> bool {
        self.granted
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&capability)
    }

    /// True iff every member of `set` is granted.
    pub fn covers(&self, set: &PermissionSet) -> bool {
        set.iter().all(|capability| self.is_granted(*capability))
    }

    /// Record the host's answer to a prompt, flag `i` belonging to the `i`-th
    /// capability of `set`. Capabilities without a flag are left untouched.
    pub fn apply(&self, set: &PermissionSet, flags: &[bool]) {
        let mut granted = self.write();
        for (capability, flag) in set.iter().zip(flags) {
            if *flag {
                granted.insert(*capability);
            } else {
                granted.remove(capability);
            }
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeSet<Capability>> {
        self.granted
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A prompt the host should show to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRequest {
    pub capabilities: PermissionSet,
}

/// Gate backed by a [`GrantTable`] whose prompts are forwarded to the host
/// over a channel. The host answers by updating the table and delivering the
/// flags to the orchestrator.
pub struct InteractivePermissionGate {
    required: PermissionSet,
    grants: Arc<GrantTable>,
    requests: Sender<PermissionRequest>,
}

impl InteractivePermissionGate {
    /// Create a gate and the receiving end for its prompt requests.
    pub fn new(required: PermissionSet, grants: Arc<GrantTable>) -> (Self, Receiver<PermissionRequest>) {
        let (requests, receiver) = unbounded();
        (
            Self {
                required,
                grants,
                requests,
            },
            receiver,
        )
    }
}

impl PermissionGate for InteractivePermissionGate {
    fn required(&self) -> &PermissionSet {
        &self.required
    }

    fn check(&self) -> bool {
        self.grants.covers(&self.required)
    }

    fn request(&self) {
        let request = PermissionRequest {
            capabilities: self.required.clone(),
        };
        if self.requests.send(request).is_err() {
            // Nobody is answering prompts; the request stays unanswered.
            tracing::debug!("Permission request dropped: no prompt host attached");
        }
    }
}

/// Gate with a fixed answer, for hosts without runtime permissions.
#[derive(Debug, Clone)]
pub struct StaticPermissionGate {
    required: PermissionSet,
    granted: bool,
}

impl StaticPermissionGate {
    pub fn granted() -> Self {
        Self {
            required: PermissionSet::default(),
            granted: true,
        }
    }

    pub fn denied() -> Self {
        Self {
            required: PermissionSet::default(),
            granted: false,
        }
    }
}

impl PermissionGate for StaticPermissionGate {
    fn required(&self) -> &PermissionSet {
        &self.required
    }

    fn check(&self) -> bool {
        self.granted
    }

    fn request(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_outcome() {
        assert!(!grant_outcome(&[]));
        assert!(!grant_outcome(&[true, false, true]));
        assert!(grant_outcome(&[true, true, true]));
        assert!(grant_outcome(&[true]));
    }

    #[test]
    fn test_permission_set_dedups_in_order() {
        let set = PermissionSet::new([
            Capability::FineLocation,
            Capability::ReadPhoneState,
            Capability::FineLocation,
        ]);
        let order: Vec<_> = set.iter().copied().collect();
        assert_eq!(order, vec![Capability::FineLocation, Capability::ReadPhoneState]);
    }

    #[test]
    fn test_partial_grant_is_ungranted() {
        let grants = Arc::new(GrantTable::new());
        let (gate, _requests) = InteractivePermissionGate::new(PermissionSet::default(), grants.clone());

        grants.grant(Capability::FineLocation);
        grants.grant(Capability::CoarseLocation);
        assert!(!gate.check());

        grants.grant(Capability::ReadPhoneState);
        assert!(gate.check());

        grants.revoke(Capability::CoarseLocation);
        assert!(!gate.check());
    }

    #[test]
    fn test_request_is_forwarded_to_host() {
        let grants = Arc::new(GrantTable::new());
        let (gate, requests) = InteractivePermissionGate::new(PermissionSet::default(), grants);

        gate.request();
        let request = requests.try_recv().unwrap();
        assert_eq!(request.capabilities.len(), 3);
        assert!(requests.try_recv().is_err());
    }

    #[test]
    fn test_request_without_host_does_not_fail() {
        let (gate, requests) =
            InteractivePermissionGate::new(PermissionSet::default(), Arc::new(GrantTable::new()));
        drop(requests);
        gate.request();
        assert!(!gate.check());
    }

    #[test]
    fn test_apply_flags() {
        let grants = GrantTable::new();
        let set = PermissionSet::default();

        grants.apply(&set, &[true, true, false]);
        assert!(grants.is_granted(Capability::ReadPhoneState));
        assert!(!grants.is_granted(Capability::CoarseLocation));
        assert!(!grants.covers(&set));

        grants.apply(&set, &[true, true, true]);
        assert!(grants.covers(&set));
    }

    #[test]
    fn test_static_gate() {
        let gate = StaticPermissionGate::denied();
        assert!(!gate.check());
        assert!(!gate.on_result(&[]));
        assert!(StaticPermissionGate::granted().check());
    }
}
