//! Producer counters

use std::sync::atomic::{AtomicU64, Ordering};

use sync_engine::{PushOutcome, SignalOutcome};

/// Lock-free counters for one producer
#[derive(Debug, Default)]
pub struct ProducerMetrics {
    /// Completed sample cycles
    samples: AtomicU64,
    /// Cycles that recorded a failure marker
    failures: AtomicU64,
    /// Signals the barrier coalesced
    coalesced: AtomicU64,
    /// Handoff pushes by outcome
    handoff_accepted: AtomicU64,
    handoff_rejected: AtomicU64,
    handoff_evicted: AtomicU64,
}

impl ProducerMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one publish cycle
    pub fn record_sample(&self, failed: bool) {
        self.samples.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_signal(&self, outcome: SignalOutcome) {
        if outcome == SignalOutcome::Coalesced {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_handoff<T>(&self, outcome: &PushOutcome<T>) {
        let counter = match outcome {
            PushOutcome::Accepted => &self.handoff_accepted,
            PushOutcome::Rejected(_) => &self.handoff_rejected,
            PushOutcome::Evicted(_) => &self.handoff_evicted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            samples: self.samples.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            handoff_accepted: self.handoff_accepted.load(Ordering::Relaxed),
            handoff_rejected: self.handoff_rejected.load(Ordering::Relaxed),
            handoff_evicted: self.handoff_evicted.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub samples: u64,
    pub failures: u64,
    pub coalesced: u64,
    pub handoff_accepted: u64,
    pub handoff_rejected: u64,
    pub handoff_evicted: u64,
}
