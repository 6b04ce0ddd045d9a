//! Global atomic counters for mdcache observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at shutdown).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lock-free atomic counters.
pub struct Metrics {
    artifacts_created: AtomicU64,
    artifacts_regenerated: AtomicU64,
    cache_hits: AtomicU64,
    webhooks_rejected: AtomicU64,
    deploys: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            artifacts_created: AtomicU64::new(0),
            artifacts_regenerated: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            webhooks_rejected: AtomicU64::new(0),
            deploys: AtomicU64::new(0),
        }
    }

    /// An artifact was written where none existed before.
    pub fn inc_created(&self) {
        self.artifacts_created.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "artifacts_created", "counter incremented");
    }

    /// A stale artifact was overwritten.
    pub fn inc_regenerated(&self) {
        self.artifacts_regenerated.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "artifacts_regenerated", "counter incremented");
    }

    /// An artifact was served without regeneration.
    pub fn inc_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "cache_hits", "counter incremented");
    }

    pub fn inc_webhooks_rejected(&self) {
        self.webhooks_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "webhooks_rejected", "counter incremented");
    }

    pub fn inc_deploys(&self) {
        self.deploys.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "deploys", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            artifacts_created = self.artifacts_created(),
            artifacts_regenerated = self.artifacts_regenerated(),
            cache_hits = self.cache_hits(),
            webhooks_rejected = self.webhooks_rejected(),
            deploys = self.deploys(),
        );
    }

    pub fn artifacts_created(&self) -> u64 {
        self.artifacts_created.load(Ordering::Relaxed)
    }

    pub fn artifacts_regenerated(&self) -> u64 {
        self.artifacts_regenerated.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn webhooks_rejected(&self) -> u64 {
        self.webhooks_rejected.load(Ordering::Relaxed)
    }

    pub fn deploys(&self) -> u64 {
        self.deploys.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.artifacts_created.store(0, Ordering::Relaxed);
        self.artifacts_regenerated.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.webhooks_rejected.store(0, Ordering::Relaxed);
        self.deploys.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        assert_eq!(m.artifacts_created(), 0);
        m.inc_created();
        m.inc_created();
        assert_eq!(m.artifacts_created(), 2);

        m.inc_regenerated();
        assert_eq!(m.artifacts_regenerated(), 1);

        m.inc_cache_hits();
        m.inc_cache_hits();
        m.inc_cache_hits();
        assert_eq!(m.cache_hits(), 3);

        m.inc_webhooks_rejected();
        m.inc_deploys();
        assert_eq!(m.webhooks_rejected(), 1);
        assert_eq!(m.deploys(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_created();
        m.inc_regenerated();
        m.inc_cache_hits();
        m.inc_webhooks_rejected();
        m.inc_deploys();
        m.reset();
        assert_eq!(m.artifacts_created(), 0);
        assert_eq!(m.artifacts_regenerated(), 0);
        assert_eq!(m.cache_hits(), 0);
        assert_eq!(m.webhooks_rejected(), 0);
        assert_eq!(m.deploys(), 0);
    }
}
