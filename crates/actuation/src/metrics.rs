//! Actuation counters

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::CommandError;

/// Counters shared by the actuator task and the command channel
#[derive(Debug, Default)]
pub struct ActuationMetrics {
    values_applied: AtomicU64,
    apply_failures: AtomicU64,
    commands_applied: AtomicU64,
    integrity_rejects: AtomicU64,
    decode_rejects: AtomicU64,
}

impl ActuationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_value(&self, ok: bool) {
        let counter = if ok {
            &self.values_applied
        } else {
            &self.apply_failures
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command(&self) {
        self.commands_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_apply_failure(&self) {
        self.apply_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reject(&self, error: &CommandError) {
        let counter = if error.is_integrity() {
            &self.integrity_rejects
        } else {
            &self.decode_rejects
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            values_applied: self.values_applied.load(Ordering::Relaxed),
            apply_failures: self.apply_failures.load(Ordering::Relaxed),
            commands_applied: self.commands_applied.load(Ordering::Relaxed),
            integrity_rejects: self.integrity_rejects.load(Ordering::Relaxed),
            decode_rejects: self.decode_rejects.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of actuation counters (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub values_applied: u64,
    pub apply_failures: u64,
    pub commands_applied: u64,
    pub integrity_rejects: u64,
    pub decode_rejects: u64,
}
