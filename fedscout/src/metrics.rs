use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Tracks dispatcher activity across sessions
#[derive(Debug, Clone)]
pub struct SearchMetrics {
    // Scheduling
    sessions_started: Arc<AtomicU64>,
    performers_scheduled: Arc<AtomicU64>,
    crawls_scheduled: Arc<AtomicU64>,

    // Result flow
    results_received: Arc<AtomicU64>,
    results_filtered: Arc<AtomicU64>,
    batches_delivered: Arc<AtomicU64>,
    batches_dropped: Arc<AtomicU64>,

    errors_reported: Arc<AtomicU64>,
}

impl SearchMetrics {
    pub fn new() -> Self {
        Self {
            sessions_started: Arc::new(AtomicU64::new(0)),
            performers_scheduled: Arc::new(AtomicU64::new(0)),
            crawls_scheduled: Arc::new(AtomicU64::new(0)),
            results_received: Arc::new(AtomicU64::new(0)),
            results_filtered: Arc::new(AtomicU64::new(0)),
            batches_delivered: Arc::new(AtomicU64::new(0)),
            batches_dropped: Arc::new(AtomicU64::new(0)),
            errors_reported: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_session(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_performer(&self) {
        self.performers_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_crawl(&self) {
        self.crawls_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one emitted batch: `received` results in, `filtered` of them rejected
    pub fn record_batch(&self, received: u64, filtered: u64) {
        self.results_received.fetch_add(received, Ordering::Relaxed);
        self.results_filtered.fetch_add(filtered, Ordering::Relaxed);
        debug!(
            "Batch of {} results, {} rejected by filters",
            received, filtered
        );
    }

    pub fn record_delivery(&self) {
        self.batches_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// A batch emitted after cancellation or deadline
    pub fn record_dropped_batch(&self) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors_reported.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values
    pub fn snapshot(&self) -> SearchStats {
        SearchStats {
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            performers_scheduled: self.performers_scheduled.load(Ordering::Relaxed),
            crawls_scheduled: self.crawls_scheduled.load(Ordering::Relaxed),
            results_received: self.results_received.load(Ordering::Relaxed),
            results_filtered: self.results_filtered.load(Ordering::Relaxed),
            batches_delivered: self.batches_delivered.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            errors_reported: self.errors_reported.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.snapshot();
        info!(
            "Search stats:\n\
             Sessions started: {}\n\
             Performers/crawls scheduled: {}/{}\n\
             Results received/filtered: {}/{}\n\
             Batches delivered/dropped: {}/{}\n\
             Errors reported: {}",
            stats.sessions_started,
            stats.performers_scheduled,
            stats.crawls_scheduled,
            stats.results_received,
            stats.results_filtered,
            stats.batches_delivered,
            stats.batches_dropped,
            stats.errors_reported
        );
    }
}

impl Default for SearchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`SearchMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub sessions_started: u64,
    pub performers_scheduled: u64,
    pub crawls_scheduled: u64,
    pub results_received: u64,
    pub results_filtered: u64,
    pub batches_delivered: u64,
    pub batches_dropped: u64,
    pub errors_reported: u64,
}
