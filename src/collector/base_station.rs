//! Push-based base-station collection.
//!
//! A [`BaseStationStream`] owns its own acquisition lifecycle and pushes the
//! full current set of visible cells to a single subscriber. Each batch
//! replaces the previous one; streams never send deltas.

use crate::collector::types::BaseStationRecord;
use crate::permission::{Capability, GrantTable};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A complete replacement set of base-station records.
pub type Batch = Vec<BaseStationRecord>;

/// Default delay between cell scans.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);

/// Shortest accepted delay between cell scans.
pub const MIN_SCAN_INTERVAL: Duration = Duration::from_millis(100);

/// Errors that can occur while running a base-station stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    AlreadyRunning,
    ScannerUnavailable(String),
    NoRuntime,
    Scan(String),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::AlreadyRunning => write!(f, "Base-station stream is already running"),
            StreamError::ScannerUnavailable(reason) => {
                write!(f, "Cell scanner unavailable: {reason}")
            }
            StreamError::NoRuntime => write!(f, "No async runtime available to run the stream"),
            StreamError::Scan(reason) => write!(f, "Cell scan failed: {reason}"),
        }
    }
}

impl std::error::Error for StreamError {}

/// Sending half of a batch subscription, held by the stream.
///
/// The subscription holds only the latest batch: a batch the subscriber has
/// not read yet is overwritten by the next one.
#[derive(Debug, Clone)]
pub struct BatchSender {
    sender: watch::Sender<Option<Batch>>,
}

impl BatchSender {
    /// Publish a batch without blocking. Returns false once the subscriber
    /// has gone away.
    pub fn deliver(&self, batch: Batch) -> bool {
        self.sender.send(Some(batch)).is_ok()
    }
}

/// Receiving half of a batch subscription, held by the subscriber.
#[derive(Debug)]
pub struct BatchSubscription {
    receiver: Option<watch::Receiver<Option<Batch>>>,
}

impl BatchSubscription {
    /// Wait for the newest unread batch. `None` once the stream side is gone
    /// or the subscription has been revoked.
    pub async fn recv(&mut self) -> Option<Batch> {
        let receiver = self.receiver.as_mut()?;
        receiver.changed().await.ok()?;
        receiver.borrow_and_update().clone()
    }

    /// The newest unread batch, if one is waiting.
    pub fn try_recv(&mut self) -> Option<Batch> {
        let receiver = self.receiver.as_mut()?;
        match receiver.has_changed() {
            Ok(true) => receiver.borrow_and_update().clone(),
            _ => None,
        }
    }

    /// Stop accepting batches. The stream notices on its next delivery.
    pub fn revoke(&mut self) {
        self.receiver = None;
    }
}

/// Create a connected sender/subscription pair.
pub fn batch_channel() -> (BatchSender, BatchSubscription) {
    let (sender, receiver) = watch::channel(None);
    (
        BatchSender { sender },
        BatchSubscription {
            receiver: Some(receiver),
        },
    )
}

/// A producer of base-station batches.
pub trait BaseStationStream: Send + Sync {
    /// Begin acquisition. Must be paired with [`BaseStationStream::stop`].
    fn start(&self) -> Result<(), StreamError>;

    /// Release any held radio resources. Idempotent, and safe to call
    /// without a successful `start`.
    fn stop(&self);

    /// Register the single listener. A new subscription replaces the old one.
    fn subscribe(&self) -> BatchSubscription;
}

/// Low-level source of visible cells.
pub trait CellScanner: Send + Sync + 'static {
    /// Whether the radio can be queried at all.
    fn availability(&self) -> Result<(), String> {
        Ok(())
    }

    /// Read every currently visible cell.
    fn scan(&self) -> Result<Batch, StreamError>;
}

/// Stream that scans on a fixed delay and pushes every non-empty result.
///
/// The first scan runs immediately after `start`. Scans are skipped while the
/// phone-state capability is not granted.
pub struct ScheduledBaseStationStream<S: CellScanner> {
    scanner: Arc<S>,
    interval: Duration,
    grants: Option<Arc<GrantTable>>,
    listener: Arc<Mutex<Option<BatchSender>>>,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<S: CellScanner> ScheduledBaseStationStream<S> {
    /// Intervals below [`MIN_SCAN_INTERVAL`] are raised to it.
    pub fn new(scanner: S, interval: Duration) -> Self {
        if interval < MIN_SCAN_INTERVAL {
            tracing::warn!(
                "Scan interval {interval:?} too short, using {MIN_SCAN_INTERVAL:?}"
            );
        }
        Self {
            scanner: Arc::new(scanner),
            interval: interval.max(MIN_SCAN_INTERVAL),
            grants: None,
            listener: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Skip scans unless `grants` holds the phone-state capability.
    pub fn with_grants(mut self, grants: Arc<GrantTable>) -> Self {
        self.grants = Some(grants);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run one scan and deliver it, outside the schedule.
    pub fn scan_now(&self) {
        scan_and_deliver(&*self.scanner, self.grants.as_deref(), &self.listener);
    }
}

impl<S: CellScanner> BaseStationStream for ScheduledBaseStationStream<S> {
    fn start(&self) -> Result<(), StreamError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(StreamError::AlreadyRunning);
        }

        if let Err(reason) = self.scanner.availability() {
            self.running.store(false, Ordering::SeqCst);
            return Err(StreamError::ScannerUnavailable(reason));
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.running.store(false, Ordering::SeqCst);
            return Err(StreamError::NoRuntime);
        };

        let scanner = self.scanner.clone();
        let grants = self.grants.clone();
        let listener = self.listener.clone();
        let running = self.running.clone();
        let period = self.interval;

        let task = handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                scan_and_deliver(&*scanner, grants.as_deref(), &listener);
            }
        });

        *self.task.lock().unwrap_or_else(|p| p.into_inner()) = Some(task);
        tracing::info!("Base-station collection started (interval {}s)", period.as_secs());
        Ok(())
    }

    fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self.task.lock().unwrap_or_else(|p| p.into_inner()).take() {
            task.abort();
        }
        tracing::info!("Base-station collection stopped");
    }

    fn subscribe(&self) -> BatchSubscription {
        let (sender, subscription) = batch_channel();
        *self.listener.lock().unwrap_or_else(|p| p.into_inner()) = Some(sender);
        subscription
    }
}

impl<S: CellScanner> Drop for ScheduledBaseStationStream<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn scan_and_deliver<S: CellScanner + ?Sized>(
    scanner: &S,
    grants: Option<&GrantTable>,
    listener: &Mutex<Option<BatchSender>>,
) {
    if let Some(grants) = grants {
        if !grants.is_granted(Capability::ReadPhoneState) {
            tracing::warn!("Phone-state permission missing, skipping cell scan");
            return;
        }
    }

    let batch = match scanner.scan() {
        Ok(batch) => batch,
        Err(e) => {
            tracing::warn!("Error collecting base-station info: {e}");
            return;
        }
    };

    if batch.is_empty() {
        tracing::debug!("No base stations visible");
        return;
    }

    let count = batch.len();
    let mut slot = listener.lock().unwrap_or_else(|p| p.into_inner());
    if let Some(sender) = slot.as_ref() {
        if !sender.deliver(batch) {
            tracing::debug!("Base-station subscriber gone, dropping listener");
            *slot = None;
            return;
        }
    }
    tracing::debug!("Collected {count} base stations");
}
