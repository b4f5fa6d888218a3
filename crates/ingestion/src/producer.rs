//! ProducerTask - one periodic sampler per sensor kind.
//!
//! Cycle: `Idle -> Sampling -> Publishing -> Idle`. Publishing copies the
//! slot into the store (lock held only for the copy), then signals the
//! barrier, then optionally pushes the scalar to the handoff queue.

use std::sync::Arc;
use std::time::Duration;

use contracts::{FailureReason, Reading, SampleFailure, SensorKind, SensorSource, SlotState};
use sync_engine::{HandoffQueue, PushOutcome, ReadinessBarrier, SharedReadingStore, SignalOutcome};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{IngestionError, Result};
use crate::metrics::ProducerMetrics;

/// Producer lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    Idle,
    Sampling,
    Publishing,
}

/// What one cycle did
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Slot written to the store
    pub slot: SlotState,
    /// Store revision of this kind's slot after the write
    pub revision: u64,
    pub signal: SignalOutcome,
    /// `None` when no handoff queue is attached or the sample failed
    pub handoff: Option<PushOutcome<u16>>,
}

/// Periodic producer bound to one sensor source
pub struct ProducerTask<S> {
    kind: SensorKind,
    period: Duration,
    source: S,
    store: Arc<SharedReadingStore>,
    barrier: Arc<ReadinessBarrier>,
    handoff: Option<Arc<HandoffQueue<u16>>>,
    metrics: Arc<ProducerMetrics>,
    state: ProducerState,
}

impl<S: SensorSource> ProducerTask<S> {
    /// Create a producer for `source.kind()`
    pub fn new(
        source: S,
        period: Duration,
        store: Arc<SharedReadingStore>,
        barrier: Arc<ReadinessBarrier>,
    ) -> Self {
        Self {
            kind: source.kind(),
            period,
            source,
            store,
            barrier,
            handoff: None,
            metrics: Arc::new(ProducerMetrics::new()),
            state: ProducerState::Idle,
        }
    }

    /// Also feed `queue` with each fresh reading's scalar
    ///
    /// # Errors
    /// `HandoffUnsupported` if this kind's readings carry no scalar.
    pub fn with_handoff(mut self, queue: Arc<HandoffQueue<u16>>) -> Result<Self> {
        if self.kind != SensorKind::Particulate {
            return Err(IngestionError::HandoffUnsupported { kind: self.kind });
        }
        self.handoff = Some(queue);
        Ok(self)
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn state(&self) -> ProducerState {
        self.state
    }

    pub fn metrics(&self) -> Arc<ProducerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run one `Sampling -> Publishing` cycle
    pub async fn cycle(&mut self) -> CycleReport {
        self.state = ProducerState::Sampling;
        let sample = match self.source.read().await {
            Ok(reading) if reading.kind() != self.kind => Err(SampleFailure::new(
                self.kind,
                FailureReason::KindMismatch,
            )),
            other => other,
        };

        self.state = ProducerState::Publishing;
        let slot = SlotState::from(sample);
        let revision = self.store.write(self.kind, slot);

        // store lock is released; logging and signalling happen outside it
        let failed = matches!(slot, SlotState::Failed { .. });
        self.metrics.record_sample(failed);
        let status = if failed { "failed" } else { "ok" };
        metrics::counter!("airnode_samples_total", "kind" => self.kind.as_str(), "status" => status)
            .increment(1);

        match &slot {
            SlotState::Failed { failure } => warn!(
                category = "sample_failure",
                kind = %self.kind,
                reason = %failure.reason,
                "sample failed, failure marker published"
            ),
            SlotState::Fresh { reading } => {
                trace!(kind = %self.kind, reading = ?reading, revision, "sample published")
            }
            SlotState::Vacant => {}
        }

        let signal = self.barrier.signal(self.kind);
        self.metrics.record_signal(signal);
        match signal {
            SignalOutcome::Coalesced => {
                debug!(kind = %self.kind, "barrier already signalled this round, coalesced")
            }
            SignalOutcome::NotParticipant => {
                debug!(kind = %self.kind, "kind not part of the barrier round")
            }
            SignalOutcome::Counted => {}
        }

        let handoff = match (&self.handoff, slot.reading().and_then(Reading::handoff_value)) {
            (Some(queue), Some(value)) => Some(self.push_handoff(queue, value).await),
            _ => None,
        };

        self.state = ProducerState::Idle;
        CycleReport {
            slot,
            revision,
            signal,
            handoff,
        }
    }

    /// Cycle every `period` until `shutdown` flips to true or its sender drops
    #[instrument(
        name = "producer_run",
        skip(self, shutdown),
        fields(kind = %self.kind, period_ms = self.period.as_millis() as u64)
    )]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Producer started");

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    self.cycle().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        info!(
            samples = snapshot.samples,
            failures = snapshot.failures,
            coalesced = snapshot.coalesced,
            "Producer stopped"
        );
    }

    async fn push_handoff(&self, queue: &HandoffQueue<u16>, value: u16) -> PushOutcome<u16> {
        let outcome = queue.push(value).await;
        self.metrics.record_handoff(&outcome);
        match outcome {
            PushOutcome::Rejected(v) => warn!(
                category = "queue_saturation",
                kind = %self.kind,
                value = v,
                capacity = queue.capacity(),
                "handoff queue full, value rejected"
            ),
            PushOutcome::Evicted(old) => warn!(
                category = "queue_saturation",
                kind = %self.kind,
                evicted = old,
                value,
                "handoff queue full, oldest value evicted"
            ),
            PushOutcome::Accepted => {}
        }
        outcome
    }
}

/// Check a source against the configured kind before building a producer
pub fn ensure_kind<S: SensorSource>(configured: SensorKind, source: &S) -> Result<()> {
    let source_kind = source.kind();
    if source_kind != configured {
        return Err(IngestionError::kind_mismatch(configured, source_kind));
    }
    Ok(())
}
