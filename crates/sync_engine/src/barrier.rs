//! ReadinessBarrier - N producers signal, one consumer waits for the full set.
//!
//! Each participant owns one bit of an atomic mask. A repeat signal from
//! the same participant before the round is taken coalesces into the
//! pending bit, so the count is the number of distinct participants and
//! can never exceed N. `await_full` takes the whole round with a single
//! compare-exchange from the full mask to zero.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use contracts::SensorKind;
use tokio::sync::Notify;
use tracing::{debug, trace};

/// Result of `ReadinessBarrier::signal`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// First signal from this participant in the current round
    Counted,
    /// Participant had already signalled; no-op
    Coalesced,
    /// Kind is not part of this barrier's round
    NotParticipant,
}

/// Result of `ReadinessBarrier::await_full`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierWait {
    /// All N participants signalled; the count has been reset to 0
    Ready,
    /// Timeout elapsed first; pending signals are left in place
    TimedOut,
}

/// Counting barrier with per-participant coalescing
#[derive(Debug)]
pub struct ReadinessBarrier {
    participants: Vec<SensorKind>,
    full_mask: u32,
    pending: AtomicU32,
    notify: Notify,
    coalesced: AtomicU64,
}

impl ReadinessBarrier {
    /// Create a closed barrier (count 0) for the given participants
    ///
    /// Duplicate kinds collapse into one participant.
    pub fn new(participants: &[SensorKind]) -> Self {
        let mut kinds: Vec<SensorKind> = Vec::with_capacity(participants.len());
        for kind in participants {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        let full_mask = kinds.iter().fold(0, |mask, k| mask | bit(*k));

        Self {
            participants: kinds,
            full_mask,
            pending: AtomicU32::new(0),
            notify: Notify::new(),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Round size N
    pub fn capacity(&self) -> usize {
        self.participants.len()
    }

    /// Participating kinds
    pub fn participants(&self) -> &[SensorKind] {
        &self.participants
    }

    /// Current count in `[0, N]`
    pub fn count(&self) -> usize {
        self.pending.load(Ordering::Acquire).count_ones() as usize
    }

    /// Participants that have not signalled in the current round
    pub fn outstanding(&self) -> Vec<SensorKind> {
        let pending = self.pending.load(Ordering::Acquire);
        self.participants
            .iter()
            .copied()
            .filter(|k| pending & bit(*k) == 0)
            .collect()
    }

    /// Total coalesced signals since creation
    pub fn coalesced_total(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    /// Mark `kind` as having new data for this round
    pub fn signal(&self, kind: SensorKind) -> SignalOutcome {
        let bit = bit(kind);
        if self.full_mask & bit == 0 {
            return SignalOutcome::NotParticipant;
        }

        let prev = self.pending.fetch_or(bit, Ordering::AcqRel);
        if prev & bit != 0 {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("airnode_barrier_signals_total", "outcome" => "coalesced")
                .increment(1);
            trace!(kind = %kind, "signal coalesced");
            return SignalOutcome::Coalesced;
        }

        let now = prev | bit;
        metrics::counter!("airnode_barrier_signals_total", "outcome" => "counted").increment(1);
        metrics::gauge!("airnode_barrier_count").set(now.count_ones() as f64);
        if now == self.full_mask {
            trace!(kind = %kind, "round complete");
            self.notify.notify_one();
        }
        SignalOutcome::Counted
    }

    /// Wait until all N participants have signalled, or `timeout` elapses
    ///
    /// `None` waits forever. On `Ready` the count is reset to 0 as part of
    /// the same atomic operation that observed it full.
    pub async fn await_full(&self, timeout: Option<Duration>) -> BarrierWait {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.wait_full()).await {
                Ok(()) => BarrierWait::Ready,
                Err(_) => {
                    debug!(
                        count = self.count(),
                        capacity = self.capacity(),
                        outstanding = ?self.outstanding(),
                        "barrier wait timed out"
                    );
                    BarrierWait::TimedOut
                }
            },
            None => {
                self.wait_full().await;
                BarrierWait::Ready
            }
        }
    }

    /// Non-blocking variant of `await_full`
    pub fn try_take_full(&self) -> bool {
        if self.participants.is_empty() {
            return false;
        }
        self.pending
            .compare_exchange(self.full_mask, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Reset the count to 0 for the next round
    ///
    /// Idempotent; signals not yet taken are discarded.
    pub fn rearm(&self) {
        self.pending.store(0, Ordering::Release);
        metrics::gauge!("airnode_barrier_count").set(0.0);
    }

    async fn wait_full(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // register before checking so a signal in between is not lost
            notified.as_mut().enable();

            if self.try_take_full() {
                metrics::gauge!("airnode_barrier_count").set(0.0);
                return;
            }
            notified.await;
        }
    }
}

#[inline]
fn bit(kind: SensorKind) -> u32 {
    1 << kind.index()
}
