//! Dispatcher counters

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{RoundOutcome, RoundReport};

/// Per-dispatcher round counters
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    rounds_sent: AtomicU64,
    rounds_failed: AtomicU64,
    rounds_skipped: AtomicU64,
    /// Sent or failed rounds that carried an incomplete snapshot
    rounds_partial: AtomicU64,
    bytes_sent: AtomicU64,
}

impl DispatcherMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one finished round
    pub fn record(&self, report: &RoundReport, bytes: usize) {
        let counter = match report.outcome {
            RoundOutcome::Sent => &self.rounds_sent,
            RoundOutcome::TransportFailed => &self.rounds_failed,
            RoundOutcome::Skipped => &self.rounds_skipped,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if report.partial {
            self.rounds_partial.fetch_add(1, Ordering::Relaxed);
        }
        if report.outcome == RoundOutcome::Sent {
            self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        }
    }

    pub fn rounds_sent(&self) -> u64 {
        self.rounds_sent.load(Ordering::Relaxed)
    }

    pub fn rounds_failed(&self) -> u64 {
        self.rounds_failed.load(Ordering::Relaxed)
    }

    pub fn rounds_skipped(&self) -> u64 {
        self.rounds_skipped.load(Ordering::Relaxed)
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rounds_sent: self.rounds_sent(),
            rounds_failed: self.rounds_failed(),
            rounds_skipped: self.rounds_skipped(),
            rounds_partial: self.rounds_partial.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher counters (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub rounds_sent: u64,
    pub rounds_failed: u64,
    pub rounds_skipped: u64,
    pub rounds_partial: u64,
    pub bytes_sent: u64,
}
