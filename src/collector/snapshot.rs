//! Pull-based telemetry snapshots.
//!
//! Providers never fail: an unavailable value is reported as placeholder
//! text so the refresh loop keeps its schedule.

use crate::collector::types::{FixProvider, LocationFix};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const LOCATION_SERVICE_UNAVAILABLE: &str = "Location service not available";
pub const LOCATION_UNAVAILABLE: &str = "Location not available";

/// Default lifetime of a cached location text.
pub const DEFAULT_LOCATION_CACHE: Duration = Duration::from_secs(30);

/// Default maximum age of a last-known fix before it is considered stale.
pub const DEFAULT_FIX_MAX_AGE: Duration = Duration::from_secs(10);

/// Minimum delay between two rounds of live fix requests.
pub const MIN_LOCATION_REQUEST_INTERVAL: Duration = Duration::from_secs(5);

/// Source of the hardware description text.
pub trait HardwareInfoProvider: Send + Sync {
    fn fetch_hardware_info(&self) -> String;
}

/// Source of the location text. Implementations may block on I/O.
pub trait LocationInfoProvider: Send + Sync {
    fn fetch_location_info(&self) -> String;
}

/// Hardware description of the machine the agent runs on.
#[derive(Debug, Default, Clone)]
pub struct SystemHardwareInfo;

impl HardwareInfoProvider for SystemHardwareInfo {
    fn fetch_hardware_info(&self) -> String {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        format!(
            "Host: {host}, OS: {}, Arch: {}, Family: {}, CPUs: {cpus}",
            std::env::consts::OS,
            std::env::consts::ARCH,
            std::env::consts::FAMILY
        )
    }
}

/// Platform location service.
pub trait LocationSource: Send + Sync {
    /// Whether any location provider is enabled.
    fn is_service_available(&self) -> bool;

    /// The last fix recorded by `provider`, if any.
    fn last_known(&self, provider: FixProvider) -> Option<LocationFix>;

    /// Ask `provider` for one live fix, to be handed to `sink` whenever it
    /// arrives, possibly before this returns. Sources without live fixes
    /// ignore the request.
    fn request_single_update(&self, _provider: FixProvider, _sink: &FixSink) {}
}

/// Mailbox for fixes delivered after a live request. Holds the newest one
/// until it is picked up.
#[derive(Debug, Clone, Default)]
pub struct FixSink {
    slot: Arc<Mutex<Option<LocationFix>>>,
}

impl FixSink {
    pub fn deliver(&self, fix: LocationFix) {
        let mut slot = self.lock();
        if slot.as_ref().map_or(true, |held| fix.timestamp >= held.timestamp) {
            *slot = Some(fix);
        }
    }

    fn take(&self) -> Option<LocationFix> {
        self.lock().take()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<LocationFix>> {
        self.slot.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[derive(Debug, Default)]
struct LocationCache {
    text: Option<(String, Instant)>,
    fix: Option<LocationFix>,
    last_request: Option<Instant>,
}

/// Formats the best available fix, caching the resulting text.
///
/// A fresh GPS fix wins over a fresh network fix. When neither is fresh both
/// providers are asked for a live fix, at most once per
/// [`MIN_LOCATION_REQUEST_INTERVAL`], and the last chosen fix is reused until
/// one arrives.
pub struct CachedLocationInfo<L: LocationSource> {
    source: L,
    cache_duration: Duration,
    fix_max_age: Duration,
    cache: Mutex<LocationCache>,
    updates: FixSink,
}

impl<L: LocationSource> CachedLocationInfo<L> {
    pub fn new(source: L) -> Self {
        Self::with_timing(source, DEFAULT_LOCATION_CACHE, DEFAULT_FIX_MAX_AGE)
    }

    pub fn with_timing(source: L, cache_duration: Duration, fix_max_age: Duration) -> Self {
        Self {
            source,
            cache_duration,
            fix_max_age,
            cache: Mutex::new(LocationCache::default()),
            updates: FixSink::default(),
        }
    }

    /// Forget the cached text and fix, including an undelivered live fix.
    pub fn clear_cache(&self) {
        *self.cache.lock().unwrap_or_else(|p| p.into_inner()) = LocationCache::default();
        self.updates.take();
    }

    fn is_fresh(&self, fix: &LocationFix) -> bool {
        // A fix stamped in the future counts as fresh.
        fix.age(Utc::now())
            .to_std()
            .map(|age| age < self.fix_max_age)
            .unwrap_or(true)
    }

    fn current_fix(&self, cache: &mut LocationCache) -> Option<LocationFix> {
        self.take_live_fix(cache);
        if let Some(fix) = cache.fix.as_ref().filter(|fix| self.is_fresh(fix)) {
            return Some(fix.clone());
        }

        let fresh = [FixProvider::Gps, FixProvider::Network]
            .into_iter()
            .filter_map(|provider| self.source.last_known(provider))
            .find(|fix| self.is_fresh(fix));

        match fresh {
            Some(fix) => {
                tracing::debug!(
                    "Using {:?} location: {}, {}",
                    fix.provider,
                    fix.latitude,
                    fix.longitude
                );
                cache.fix = Some(fix);
            }
            None => {
                tracing::debug!("No recent last-known location available");
                self.request_live_fix(cache);
                self.take_live_fix(cache);
            }
        }
        cache.fix.clone()
    }

    fn take_live_fix(&self, cache: &mut LocationCache) {
        if let Some(fix) = self.updates.take() {
            tracing::debug!("Live {:?} location received", fix.provider);
            cache.fix = Some(fix);
        }
    }

    fn request_live_fix(&self, cache: &mut LocationCache) {
        let now = Instant::now();
        if let Some(at) = cache.last_request {
            if now.duration_since(at) < MIN_LOCATION_REQUEST_INTERVAL {
                return;
            }
        }
        cache.last_request = Some(now);
        for provider in [FixProvider::Gps, FixProvider::Network] {
            self.source.request_single_update(provider, &self.updates);
        }
    }
}

impl<L: LocationSource> LocationInfoProvider for CachedLocationInfo<L> {
    fn fetch_location_info(&self) -> String {
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        let now = Instant::now();

        if let Some((text, at)) = &cache.text {
            if now.duration_since(*at) < self.cache_duration {
                return text.clone();
            }
        }

        let text = if !self.source.is_service_available() {
            LOCATION_SERVICE_UNAVAILABLE.to_string()
        } else {
            match self.current_fix(&mut cache) {
                Some(fix) => format!("Latitude: {}, Longitude: {}", fix.latitude, fix.longitude),
                None => LOCATION_UNAVAILABLE.to_string(),
            }
        };

        cache.text = Some((text.clone(), now));
        text
    }
}
