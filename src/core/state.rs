//! Observable screen state.
//!
//! One writer (the orchestrator) publishes into a `watch` channel; any
//! number of readers observe it. Every field update is a single
//! `send_modify`, so readers never see a partially applied batch.

use crate::collector::types::BaseStationRecord;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Everything the presentation layer displays.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObservableState {
    /// Device fingerprint text
    pub fingerprint: String,
    /// Hardware snapshot text, empty until first fetched
    pub hardware_info: String,
    /// Location snapshot text, empty until first fetched
    pub location_info: String,
    /// Most recent base-station batch, in delivery order
    pub base_stations: Vec<BaseStationRecord>,
    /// Whether the permission prompt should be shown
    pub permission_prompt_visible: bool,
}

impl ObservableState {
    pub fn new(fingerprint: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            ..Self::default()
        }
    }
}

/// Write side of the state. Sealing it makes every later write a no-op.
#[derive(Debug, Clone)]
pub struct StatePublisher {
    sender: Arc<Mutex<Option<watch::Sender<ObservableState>>>>,
}

impl StatePublisher {
    /// Create a publisher and a first reader.
    pub fn new(initial: ObservableState) -> (Self, StateHandle) {
        let (sender, receiver) = watch::channel(initial);
        (
            Self {
                sender: Arc::new(Mutex::new(Some(sender))),
            },
            StateHandle { receiver },
        )
    }

    pub fn set_hardware_info(&self, text: String) -> bool {
        self.update(|state| state.hardware_info = text)
    }

    pub fn set_location_info(&self, text: String) -> bool {
        self.update(|state| state.location_info = text)
    }

    /// Replace the whole base-station list with `batch`.
    pub fn replace_base_stations(&self, batch: Vec<BaseStationRecord>) -> bool {
        self.update(|state| state.base_stations = batch)
    }

    pub fn set_prompt_visible(&self, visible: bool) -> bool {
        self.update(|state| state.permission_prompt_visible = visible)
    }

    /// Raise the permission prompt. True only if it was hidden before; an
    /// already visible prompt is left alone and readers are not notified.
    pub fn show_prompt(&self) -> bool {
        match self.lock().as_ref() {
            Some(sender) => sender.send_if_modified(|state| {
                let was_hidden = !state.permission_prompt_visible;
                state.permission_prompt_visible = true;
                was_hidden
            }),
            None => false,
        }
    }

    /// Stop accepting writes. Readers keep the last published value.
    pub fn seal(&self) {
        self.lock().take();
    }

    pub fn is_sealed(&self) -> bool {
        self.lock().is_none()
    }

    /// Apply `f` as one atomic update. Returns false once sealed.
    fn update(&self, f: impl FnOnce(&mut ObservableState)) -> bool {
        match self.lock().as_ref() {
            Some(sender) => {
                sender.send_modify(f);
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<watch::Sender<ObservableState>>> {
        self.sender.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Read-only view of the state for the presentation layer.
#[derive(Debug, Clone)]
pub struct StateHandle {
    receiver: watch::Receiver<ObservableState>,
}

impl StateHandle {
    /// Copy of the current state.
    pub fn current(&self) -> ObservableState {
        self.receiver.borrow().clone()
    }

    /// Read the current state without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&ObservableState) -> R) -> R {
        f(&self.receiver.borrow())
    }

    /// Wait until the state changes. Returns false once the publisher is
    /// sealed and no further changes can happen.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Wait until `predicate` holds, returning the matching state. `None`
    /// if the publisher is sealed first.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&ObservableState) -> bool,
    ) -> Option<ObservableState> {
        self.receiver
            .wait_for(predicate)
            .await
            .ok()
            .map(|state| state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::RadioType;

    #[test]
    fn test_initial_state() {
        let (_publisher, handle) = StatePublisher::new(ObservableState::new("abcd"));
        let state = handle.current();
        assert_eq!(state.fingerprint, "abcd");
        assert!(state.hardware_info.is_empty());
        assert!(state.location_info.is_empty());
        assert!(state.base_stations.is_empty());
        assert!(!state.permission_prompt_visible);
    }

    #[test]
    fn test_batches_replace_not_accumulate() {
        let (publisher, handle) = StatePublisher::new(ObservableState::default());
        let a = BaseStationRecord::new(RadioType::Gsm, 1, 1, -60);
        let b = BaseStationRecord::new(RadioType::Lte, 2, 2, -70);

        publisher.replace_base_stations(vec![a.clone(), b.clone()]);
        publisher.replace_base_stations(vec![b.clone()]);
        assert_eq!(handle.current().base_stations, vec![b]);
    }

    #[test]
    fn test_sealed_publisher_ignores_writes() {
        let (publisher, handle) = StatePublisher::new(ObservableState::default());
        assert!(publisher.set_location_info("here".to_string()));

        publisher.seal();
        assert!(publisher.is_sealed());
        assert!(!publisher.set_location_info("there".to_string()));
        assert!(!publisher.set_prompt_visible(true));

        let state = handle.current();
        assert_eq!(state.location_info, "here");
        assert!(!state.permission_prompt_visible);
    }

    #[tokio::test]
    async fn test_changed_reports_seal() {
        let (publisher, mut handle) = StatePublisher::new(ObservableState::default());
        publisher.set_hardware_info("hw".to_string());
        assert!(handle.changed().await);
        assert_eq!(handle.with(|s| s.hardware_info.clone()), "hw");

        publisher.seal();
        assert!(!handle.changed().await);
    }

    #[tokio::test]
    async fn test_show_prompt_reports_transition() {
        let (publisher, mut handle) = StatePublisher::new(ObservableState::default());

        assert!(publisher.show_prompt());
        assert!(handle.changed().await);
        assert!(!publisher.show_prompt());

        publisher.set_prompt_visible(false);
        assert!(publisher.show_prompt());

        publisher.seal();
        assert!(!publisher.show_prompt());
    }

    #[tokio::test]
    async fn test_wait_for_predicate() {
        let (publisher, mut handle) = StatePublisher::new(ObservableState::default());
        let writer = publisher.clone();
        tokio::spawn(async move {
            writer.set_prompt_visible(true);
        });
        let state = handle.wait_for(|s| s.permission_prompt_visible).await.unwrap();
        assert!(state.permission_prompt_visible);
    }
}
