//! Dispatcher - the single consumer of full rounds
//!
//! Each round: wait on the barrier, copy the store into a payload while
//! holding the store lock, release it, hand the bytes to the transport,
//! then rearm the barrier whatever the transport said. A dispatch attempt
//! is followed by `min_interval` of sleep so uplink frequency does not
//! track producer cadence.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use contracts::{
    Framing, NodeBlueprint, RoundOutcome, RoundReport, RoundTimeoutPolicy, SensorKind,
    TelemetryPayload, Transport,
};
use sync_engine::{BarrierWait, ReadinessBarrier, SharedReadingStore};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::metrics::{DispatcherMetrics, MetricsSnapshot};
use crate::payload;

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Stamped on every payload
    pub device_id: String,
    /// Kinds expected in a full round
    pub participants: Vec<SensorKind>,
    /// Bounded barrier wait, `None` = forever
    pub round_timeout: Option<Duration>,
    /// Sleep after each dispatch attempt
    pub min_interval: Duration,
    pub on_timeout: RoundTimeoutPolicy,
    pub framing: Framing,
}

impl DispatcherConfig {
    pub fn from_blueprint(blueprint: &NodeBlueprint) -> Self {
        Self {
            device_id: blueprint.node.device_id.clone(),
            participants: blueprint.participants(),
            round_timeout: blueprint.dispatch.round_timeout(),
            min_interval: blueprint.dispatch.min_interval(),
            on_timeout: blueprint.dispatch.on_timeout,
            framing: blueprint.transport.framing,
        }
    }
}

/// Round consumer bound to one transport
pub struct Dispatcher<T> {
    config: DispatcherConfig,
    store: Arc<SharedReadingStore>,
    barrier: Arc<ReadinessBarrier>,
    transport: T,
    reports: Option<mpsc::Sender<RoundReport>>,
    metrics: Arc<DispatcherMetrics>,
    round: u64,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(
        config: DispatcherConfig,
        store: Arc<SharedReadingStore>,
        barrier: Arc<ReadinessBarrier>,
        transport: T,
    ) -> Self {
        Self {
            config,
            store,
            barrier,
            transport,
            reports: None,
            metrics: Arc::new(DispatcherMetrics::new()),
            round: 0,
        }
    }

    /// Publish a `RoundReport` per round on `tx`
    ///
    /// Reports are offered with `try_send`; a full or closed channel drops
    /// the report, never the round.
    pub fn with_reports(mut self, tx: mpsc::Sender<RoundReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    pub fn metrics(&self) -> Arc<DispatcherMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Wait for one round and dispatch it
    pub async fn run_round(&mut self) -> RoundReport {
        self.round += 1;
        let round = self.round;

        let wait_started = Instant::now();
        let wait = self.barrier.await_full(self.config.round_timeout).await;
        let wait_ms = wait_started.elapsed().as_secs_f64() * 1000.0;

        let partial = match (wait, self.config.on_timeout) {
            (BarrierWait::Ready, _) => false,
            (BarrierWait::TimedOut, RoundTimeoutPolicy::Partial) => true,
            (BarrierWait::TimedOut, RoundTimeoutPolicy::Skip) => {
                let missing = self.barrier.outstanding();
                self.barrier.rearm();
                info!(round, missing = ?missing, "round timed out, skipped");
                let report = RoundReport {
                    round,
                    outcome: RoundOutcome::Skipped,
                    wait_ms,
                    dispatch_latency_ms: None,
                    missing,
                    partial: false,
                };
                self.finish(&report, 0);
                return report;
            }
        };

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let payload = self.store.with_exclusive_access(|snapshot| {
            let mut payload = TelemetryPayload::from_snapshot(
                self.config.device_id.as_str(),
                round,
                timestamp,
                snapshot,
                &self.config.participants,
            );
            payload.partial = partial;
            payload
        });
        // store lock released; nothing below holds it across I/O

        let send_started = Instant::now();
        let result = match payload::encode(&payload, self.config.framing) {
            Ok(bytes) => self.transport.send(&bytes).await.map(|()| bytes.len()),
            Err(e) => Err(e),
        };
        let latency_ms = send_started.elapsed().as_secs_f64() * 1000.0;

        self.barrier.rearm();

        let (outcome, bytes) = match result {
            Ok(bytes) => {
                debug!(round, bytes, partial, "round dispatched");
                (RoundOutcome::Sent, bytes)
            }
            Err(e) => {
                warn!(
                    category = "transport_failure",
                    transport = %self.transport.name(),
                    round,
                    error = %e,
                    "dispatch failed, round dropped"
                );
                (RoundOutcome::TransportFailed, 0)
            }
        };

        let report = RoundReport {
            round,
            outcome,
            wait_ms,
            dispatch_latency_ms: Some(latency_ms),
            missing: payload.missing,
            partial,
        };
        self.finish(&report, bytes);
        report
    }

    /// Dispatch rounds until `shutdown` flips to true or its sender drops
    #[instrument(
        name = "dispatcher_run",
        skip(self, shutdown),
        fields(transport = %self.transport.name(), participants = self.config.participants.len())
    )]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            min_interval_ms = self.config.min_interval.as_millis() as u64,
            "Dispatcher started"
        );

        while !*shutdown.borrow() {
            let report = tokio::select! {
                report = self.run_round() => report,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            if report.is_dispatch_attempt() && !self.config.min_interval.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.min_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        if let Err(e) = self.transport.close().await {
            warn!(error = %e, "transport close failed");
        }

        let snapshot = self.metrics.snapshot();
        info!(
            sent = snapshot.rounds_sent,
            failed = snapshot.rounds_failed,
            skipped = snapshot.rounds_skipped,
            "Dispatcher stopped"
        );
    }

    fn finish(&self, report: &RoundReport, bytes: usize) {
        self.metrics.record(report, bytes);
        if let Some(tx) = &self.reports {
            if tx.try_send(report.clone()).is_err() {
                debug!(round = report.round, "report channel full or closed");
            }
        }
    }
}

impl<T> Dispatcher<T> {
    /// Counter snapshot without a `Transport` bound
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
