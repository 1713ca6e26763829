//! Telemetry collection orchestrator.
//!
//! Drives one screen's collection lifecycle:
//!
//! ```text
//!   Idle ──check ok──▶ Starting ──▶ Running ──cancel──▶ Cancelled
//!    │  ▲
//!    │  └── grant result ◀── request ◀── acknowledge prompt
//!    └── check failed: show prompt, stay Idle
//! ```
//!
//! Starting happens at most once per orchestrator. While Running a single
//! task applies base-station batches and re-reads location on a fixed
//! interval until the orchestrator is cancelled.

use crate::collector::base_station::{BaseStationStream, BatchSubscription};
use crate::collector::snapshot::{HardwareInfoProvider, LocationInfoProvider};
use crate::core::state::{ObservableState, StateHandle, StatePublisher};
use crate::fingerprint::{fingerprint_text, FingerprintSource};
use crate::permission::PermissionGate;
use crate::transparency::{create_shared_stats, SharedCollectionStats};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

/// Default delay between location refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Shortest accepted delay between location refreshes.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// Orchestrator timing.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Delay between location refresh ticks; the first tick fires one
    /// interval after the session starts. Raised to
    /// [`MIN_REFRESH_INTERVAL`] if shorter.
    pub refresh_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

/// External services the orchestrator composes.
#[derive(Clone)]
pub struct Collaborators {
    pub gate: Arc<dyn PermissionGate>,
    pub stream: Arc<dyn BaseStationStream>,
    pub hardware: Arc<dyn HardwareInfoProvider>,
    pub location: Arc<dyn LocationInfoProvider>,
    pub fingerprint: Arc<dyn FingerprintSource>,
}

/// Lifecycle phase of an orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Starting,
    Running,
    Cancelled,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Starting => "starting",
            Phase::Running => "running",
            Phase::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Errors returned by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    /// Collection was triggered outside a Tokio runtime.
    NoRuntime,
}

impl std::fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestratorError::NoRuntime => {
                write!(f, "Collection must be started from within a Tokio runtime")
            }
        }
    }
}

impl std::error::Error for OrchestratorError {}

/// The one running collection of an orchestrator: its refresh task and the
/// token that stops it. Not `Clone`; only the orchestrator holds it.
#[derive(Debug)]
pub struct CollectionSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CollectionSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Signal the refresh task to exit and hand back its handle.
    fn end(self) -> JoinHandle<()> {
        let _ = self.shutdown.send(true);
        self.task
    }
}

/// Coordinates permission gating, the base-station stream and the periodic
/// location refresh for one screen.
pub struct CollectionOrchestrator {
    gate: Arc<dyn PermissionGate>,
    stream: Arc<dyn BaseStationStream>,
    hardware: Arc<dyn HardwareInfoProvider>,
    location: Arc<dyn LocationInfoProvider>,
    config: OrchestratorConfig,
    publisher: StatePublisher,
    state: StateHandle,
    stats: SharedCollectionStats,
    started: AtomicBool,
    request_in_flight: AtomicBool,
    phase: Mutex<Phase>,
    session: Mutex<Option<CollectionSession>>,
}

impl CollectionOrchestrator {
    /// Build an orchestrator in the Idle phase. The fingerprint is read once,
    /// here.
    pub fn new(collaborators: Collaborators, mut config: OrchestratorConfig) -> Self {
        if config.refresh_interval < MIN_REFRESH_INTERVAL {
            tracing::warn!(
                "Refresh interval {:?} too short, using {MIN_REFRESH_INTERVAL:?}",
                config.refresh_interval
            );
            config.refresh_interval = MIN_REFRESH_INTERVAL;
        }
        let fingerprint = fingerprint_text(collaborators.fingerprint.as_ref());
        let (publisher, state) = StatePublisher::new(ObservableState::new(fingerprint));

        Self {
            gate: collaborators.gate,
            stream: collaborators.stream,
            hardware: collaborators.hardware,
            location: collaborators.location,
            config,
            publisher,
            state,
            stats: create_shared_stats(),
            started: AtomicBool::new(false),
            request_in_flight: AtomicBool::new(false),
            phase: Mutex::new(Phase::Idle),
            session: Mutex::new(None),
        }
    }

    /// A reader for the published state.
    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    pub fn stats(&self) -> SharedCollectionStats {
        self.stats.clone()
    }

    pub fn phase(&self) -> Phase {
        *self.lock_phase()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.lock_session().as_ref().map(CollectionSession::id)
    }

    /// When the running session started, if one is running.
    pub fn session_started_at(&self) -> Option<DateTime<Utc>> {
        self.lock_session().as_ref().map(CollectionSession::started_at)
    }

    pub fn is_request_pending(&self) -> bool {
        self.request_in_flight.load(Ordering::SeqCst)
    }

    /// Evaluate the Idle phase: start collecting if every capability is
    /// granted, otherwise raise the permission prompt. Does nothing outside
    /// Idle, so calling it repeatedly is harmless.
    pub fn evaluate(&self) -> Result<Phase, OrchestratorError> {
        if self.phase() != Phase::Idle {
            return Ok(self.phase());
        }

        if self.gate.check() {
            self.start_session()?;
        } else if self.publisher.show_prompt() {
            let missing: Vec<String> =
                self.gate.required().iter().map(|c| c.to_string()).collect();
            tracing::info!(
                "Required permissions missing ({}), showing prompt",
                missing.join(", ")
            );
            self.stats.record_prompt_shown();
        }
        Ok(self.phase())
    }

    /// The user acknowledged the prompt: dismiss it and ask the host for the
    /// capabilities, unless a request is already waiting for an answer.
    pub fn acknowledge_permission_prompt(&self) {
        if self.phase() == Phase::Cancelled {
            return;
        }
        self.publisher.set_prompt_visible(false);

        if self.request_in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("Permission request already pending, not re-requesting");
            return;
        }
        self.stats.record_request_sent();
        self.gate.request();
    }

    /// Deliver the host's answer to a permission request. On a grant the
    /// Idle phase is re-evaluated; a denial leaves the orchestrator Idle with
    /// the prompt dismissed.
    pub fn on_permission_result(&self, granted_flags: &[bool]) -> Result<bool, OrchestratorError> {
        self.request_in_flight.store(false, Ordering::SeqCst);
        let granted = self.gate.on_result(granted_flags);

        if !granted {
            tracing::info!("Permission request denied");
            return Ok(false);
        }
        if self.phase() == Phase::Idle {
            if self.gate.check() {
                self.start_session()?;
            } else {
                tracing::warn!("Grant reported but required capabilities are still missing");
            }
        }
        Ok(true)
    }

    /// Cancel collection. Idempotent; the refresh task exits on its own.
    pub fn cancel(&self) {
        drop(self.cancel_session());
    }

    /// Cancel collection and wait for the refresh task to finish.
    pub async fn shutdown(&self) {
        if let Some(task) = self.cancel_session() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!("Refresh task panicked: {e}");
                }
            }
        }
    }

    fn start_session(&self) -> Result<(), OrchestratorError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| OrchestratorError::NoRuntime)?;

        // Held for the whole start so cancel() cannot interleave.
        let mut slot = self.lock_session();
        if self.phase() == Phase::Cancelled {
            return Ok(());
        }
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Collection already started, ignoring start trigger");
            return Ok(());
        }
        self.set_phase(Phase::Starting);
        self.publisher.set_prompt_visible(false);

        let subscription = self.stream.subscribe();
        if let Err(e) = self.stream.start() {
            tracing::warn!("Base-station stream failed to start, continuing without it: {e}");
        }

        self.publisher
            .set_hardware_info(self.hardware.fetch_hardware_info());
        self.publisher
            .set_location_info(self.location.fetch_location_info());

        let (shutdown, shutdown_rx) = watch::channel(false);
        let refresh = RefreshLoop {
            gate: self.gate.clone(),
            location: self.location.clone(),
            publisher: self.publisher.clone(),
            stats: self.stats.clone(),
            period: self.config.refresh_interval,
        };
        let task = runtime.spawn(refresh.run(subscription, shutdown_rx));

        let session = CollectionSession {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            shutdown,
            task,
        };
        tracing::info!(
            "Collection session {} started (refresh every {}s)",
            session.id,
            self.config.refresh_interval.as_secs()
        );
        *slot = Some(session);
        self.set_phase(Phase::Running);
        Ok(())
    }

    fn cancel_session(&self) -> Option<JoinHandle<()>> {
        let mut slot = self.lock_session();
        {
            let mut phase = self.lock_phase();
            if *phase == Phase::Cancelled {
                return None;
            }
            *phase = Phase::Cancelled;
        }

        let task = slot.take().map(|session| {
            tracing::info!("Collection session {} cancelled", session.id);
            session.end()
        });
        self.stream.stop();
        self.publisher.seal();
        task
    }

    fn set_phase(&self, phase: Phase) {
        *self.lock_phase() = phase;
    }

    fn lock_phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<CollectionSession>> {
        self.session.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Drop for CollectionOrchestrator {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// State the refresh task needs, moved into it at start.
struct RefreshLoop {
    gate: Arc<dyn PermissionGate>,
    location: Arc<dyn LocationInfoProvider>,
    publisher: StatePublisher,
    stats: SharedCollectionStats,
    period: Duration,
}

impl RefreshLoop {
    async fn run(self, mut subscription: BatchSubscription, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stream_open = true;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => break,

                batch = subscription.recv(), if stream_open => match batch {
                    Some(batch) => {
                        let count = batch.len();
                        if self.publisher.replace_base_stations(batch) {
                            self.stats.record_batch(count);
                        }
                    }
                    None => {
                        tracing::debug!("Base-station subscription closed");
                        stream_open = false;
                    }
                },

                _ = ticker.tick() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    self.refresh_location().await;
                }
            }
        }

        subscription.revoke();
        tracing::debug!("Refresh loop exited");
    }

    async fn refresh_location(&self) {
        if !self.gate.check() {
            tracing::debug!("Permission revoked, skipping location refresh");
            self.stats.record_refresh(false);
            return;
        }

        // Providers may block on I/O.
        let location = self.location.clone();
        let text = match tokio::task::spawn_blocking(move || location.fetch_location_info()).await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Location fetch failed: {e}");
                self.stats.record_refresh(false);
                return;
            }
        };
        if self.publisher.set_location_info(text) {
            self.stats.record_refresh(true);
        }
    }
}
