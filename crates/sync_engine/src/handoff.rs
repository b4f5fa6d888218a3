//! HandoffQueue - bounded FIFO between one producer and the actuator.
//!
//! Backed by a lock-free `ArrayQueue`: enqueue, dequeue and eviction are
//! single atomic operations, so the queue never takes a lock and can never
//! nest with the reading store's lock. Waiting is done on `Notify`, one for
//! items and one for free space.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contracts::{HandoffConfig, SaturationPolicy};
use crossbeam::queue::ArrayQueue;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Result of `HandoffQueue::push`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome<T> {
    /// Value enqueued with room to spare
    Accepted,
    /// Queue stayed full; the new value is handed back and the queue is unchanged
    Rejected(T),
    /// Value enqueued after evicting the oldest item (returned)
    Evicted(T),
}

impl<T> PushOutcome<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PushOutcome::Accepted)
    }

    /// Outcome label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            PushOutcome::Accepted => "accepted",
            PushOutcome::Rejected(_) => "rejected",
            PushOutcome::Evicted(_) => "evicted",
        }
    }
}

/// Queue counters snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub accepted: u64,
    pub rejected: u64,
    pub evicted: u64,
    pub popped: u64,
}

#[derive(Debug, Default)]
struct QueueCounters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    evicted: AtomicU64,
    popped: AtomicU64,
}

/// Bounded FIFO with an explicit saturation policy
pub struct HandoffQueue<T> {
    ring: ArrayQueue<T>,
    policy: SaturationPolicy,
    push_timeout: Duration,
    items: Notify,
    space: Notify,
    counters: QueueCounters,
}

impl<T> fmt::Debug for HandoffQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandoffQueue")
            .field("len", &self.len())
            .field("capacity", &self.ring.capacity())
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T> HandoffQueue<T> {
    /// Create a queue; a zero capacity is raised to 1
    pub fn new(capacity: usize, policy: SaturationPolicy, push_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: ArrayQueue::new(capacity),
            policy,
            push_timeout,
            items: Notify::new(),
            space: Notify::new(),
            counters: QueueCounters::default(),
        }
    }

    pub fn from_config(config: &HandoffConfig) -> Self {
        Self::new(config.capacity, config.policy, config.push_timeout())
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn policy(&self) -> SaturationPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
            popped: self.counters.popped.load(Ordering::Relaxed),
        }
    }

    /// Enqueue `value` according to the saturation policy
    ///
    /// - `Reject`: waits at most `push_timeout` for space, then rejects.
    /// - `DropOldest`: never waits; evicts the head when full.
    pub async fn push(&self, value: T) -> PushOutcome<T> {
        let outcome = match self.policy {
            SaturationPolicy::DropOldest => self.push_evicting(value),
            SaturationPolicy::Reject => self.push_bounded(value).await,
        };
        self.record(&outcome);
        outcome
    }

    /// Dequeue the oldest item, waiting up to `timeout` (`None` = forever)
    pub async fn pop(&self, timeout: Option<Duration>) -> Option<T> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.wait_pop()).await.ok(),
            None => Some(self.wait_pop().await),
        }
    }

    /// Dequeue without waiting
    pub fn try_pop(&self) -> Option<T> {
        let value = self.ring.pop();
        if value.is_some() {
            self.counters.popped.fetch_add(1, Ordering::Relaxed);
            self.space.notify_one();
            metrics::gauge!("airnode_handoff_depth").set(self.len() as f64);
        }
        value
    }

    async fn wait_pop(&self) -> T {
        loop {
            let notified = self.items.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.try_pop() {
                return value;
            }
            notified.await;
        }
    }

    async fn push_bounded(&self, mut value: T) -> PushOutcome<T> {
        let deadline = Instant::now() + self.push_timeout;
        loop {
            let notified = self.space.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.push_raw(value) {
                Ok(()) => return PushOutcome::Accepted,
                Err(rejected) => value = rejected,
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return match self.push_raw(value) {
                    Ok(()) => PushOutcome::Accepted,
                    Err(rejected) => PushOutcome::Rejected(rejected),
                };
            }
        }
    }

    fn push_evicting(&self, value: T) -> PushOutcome<T> {
        // head eviction and tail insertion happen as one atomic step
        let evicted = self.ring.force_push(value);
        self.items.notify_one();
        match evicted {
            Some(old) => PushOutcome::Evicted(old),
            None => PushOutcome::Accepted,
        }
    }

    fn push_raw(&self, value: T) -> Result<(), T> {
        self.ring.push(value)?;
        self.items.notify_one();
        Ok(())
    }

    fn record(&self, outcome: &PushOutcome<T>) {
        let counter = match outcome {
            PushOutcome::Accepted => &self.counters.accepted,
            PushOutcome::Rejected(_) => &self.counters.rejected,
            PushOutcome::Evicted(_) => &self.counters.evicted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("airnode_handoff_push_total", "outcome" => outcome.as_str())
            .increment(1);
        metrics::gauge!("airnode_handoff_depth").set(self.len() as f64);
    }
}
