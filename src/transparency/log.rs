//! Collection transparency counters.
//!
//! Tracks how often the agent touched each telemetry source during the
//! current session. Counts only; no collected values are kept here, and
//! nothing is written to disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for one orchestrator session.
#[derive(Debug)]
pub struct CollectionStats {
    /// Base-station batches applied to the screen state
    batches_received: AtomicU64,
    /// Total records across those batches
    records_received: AtomicU64,
    /// Refresh ticks that fired
    refresh_attempts: AtomicU64,
    /// Refresh ticks that re-read location
    location_refreshes: AtomicU64,
    /// Refresh ticks skipped because permission was revoked
    refresh_skipped: AtomicU64,
    /// Times the permission prompt was shown
    prompts_shown: AtomicU64,
    /// Prompt requests forwarded to the host
    requests_sent: AtomicU64,
    /// When the counters were created
    created_at: DateTime<Utc>,
}

impl CollectionStats {
    pub fn new() -> Self {
        Self {
            batches_received: AtomicU64::new(0),
            records_received: AtomicU64::new(0),
            refresh_attempts: AtomicU64::new(0),
            location_refreshes: AtomicU64::new(0),
            refresh_skipped: AtomicU64::new(0),
            prompts_shown: AtomicU64::new(0),
            requests_sent: AtomicU64::new(0),
            created_at: Utc::now(),
        }
    }

    /// Record an applied batch of `records` base stations.
    pub fn record_batch(&self, records: usize) {
        self.batches_received.fetch_add(1, Ordering::Relaxed);
        self.records_received
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    /// Record a refresh tick and whether it re-read location.
    pub fn record_refresh(&self, refreshed: bool) {
        self.refresh_attempts.fetch_add(1, Ordering::Relaxed);
        if refreshed {
            self.location_refreshes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.refresh_skipped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_prompt_shown(&self) {
        self.prompts_shown.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            batches_received: self.batches_received.load(Ordering::Relaxed),
            records_received: self.records_received.load(Ordering::Relaxed),
            refresh_attempts: self.refresh_attempts.load(Ordering::Relaxed),
            location_refreshes: self.location_refreshes.load(Ordering::Relaxed),
            refresh_skipped: self.refresh_skipped.load(Ordering::Relaxed),
            prompts_shown: self.prompts_shown.load(Ordering::Relaxed),
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            created_at: self.created_at,
            uptime_secs: (Utc::now() - self.created_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Session Statistics:\n\
             - Base-station batches: {} ({} records)\n\
             - Refresh ticks: {} ({} location reads, {} skipped)\n\
             - Permission prompts shown: {}\n\
             - Permission requests sent: {}\n\
             - Uptime: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - Values are displayed locally only\n\
             - Nothing is persisted or transmitted",
            stats.batches_received,
            stats.records_received,
            stats.refresh_attempts,
            stats.location_refreshes,
            stats.refresh_skipped,
            stats.prompts_shown,
            stats.requests_sent,
            stats.uptime_secs
        )
    }
}

impl Default for CollectionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`CollectionStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub batches_received: u64,
    pub records_received: u64,
    pub refresh_attempts: u64,
    pub location_refreshes: u64,
    pub refresh_skipped: u64,
    pub prompts_shown: u64,
    pub requests_sent: u64,
    pub created_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Thread-safe shared stats.
pub type SharedCollectionStats = Arc<CollectionStats>;

/// Create a new shared stats handle.
pub fn create_shared_stats() -> SharedCollectionStats {
    Arc::new(CollectionStats::new())
}
