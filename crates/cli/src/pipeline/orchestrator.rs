//! Node orchestrator - wires the primitives and spawns every task.
//!
//! Shared state: one `SharedReadingStore`, one `ReadinessBarrier` over the
//! configured producer kinds and, when a producer is flagged for handoff,
//! one `HandoffQueue`. Every task watches the same shutdown channel.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use actuation::{
    open_source, ActuationMetrics, ActuatorTask, CommandChannel, LoggingLed, LoggingMotor,
};
use anyhow::{Context, Result};
use contracts::NodeBlueprint;
use dispatcher::{AnyTransport, Dispatcher, DispatcherConfig};
use ingestion::ProducerGroup;
use observability::{record_node_info, record_round, RoundStatsAggregator};
use sync_engine::{HandoffQueue, ReadinessBarrier, SharedReadingStore};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{NodeStats, StopReason};
use crate::error::CliError;

/// Round reports buffered between the dispatcher and the stats loop
const REPORT_CHANNEL_CAPACITY: usize = 64;

/// How long to wait for a task to notice shutdown
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Node configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub blueprint: NodeBlueprint,

    /// Stop after this many rounds (None = unlimited)
    pub max_rounds: Option<u64>,

    /// Run timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Node orchestrator
pub struct Node {
    config: NodeConfig,
}

impl Node {
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    /// Run until `stop` resolves, the timeout elapses or `max_rounds` is reached
    pub async fn run(self, stop: impl Future<Output = ()>) -> Result<NodeStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
        }
        record_node_info(&blueprint.node.device_id, &blueprint.participants());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Shared state
        let store = Arc::new(SharedReadingStore::new());
        let barrier = Arc::new(ReadinessBarrier::new(&blueprint.participants()));
        let queue = blueprint
            .handoff_producer()
            .map(|_| Arc::new(HandoffQueue::<u16>::from_config(&blueprint.handoff)));

        info!(
            participants = barrier.capacity(),
            handoff = queue.is_some(),
            "Shared state initialized"
        );

        // Dispatcher
        let transport = AnyTransport::from_config(&blueprint.transport)
            .await
            .context("Failed to create transport")?;
        let (report_tx, mut report_rx) = mpsc::channel(REPORT_CHANNEL_CAPACITY);
        let dispatcher = Dispatcher::new(
            DispatcherConfig::from_blueprint(blueprint),
            Arc::clone(&store),
            Arc::clone(&barrier),
            transport,
        )
        .with_reports(report_tx);
        let dispatcher_metrics = dispatcher.metrics();
        let dispatcher_handle = tokio::spawn(dispatcher.run(shutdown_rx.clone()));

        // Actuation
        let motor = LoggingMotor::new("fan", blueprint.actuator.max_duty);
        let actuation_metrics = Arc::new(ActuationMetrics::new());
        let mut actuation_handles: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

        if let Some(queue) = &queue {
            let task = ActuatorTask::new(motor.clone(), Arc::clone(queue), &blueprint.actuator)
                .with_metrics(Arc::clone(&actuation_metrics));
            actuation_handles.push(("actuator", tokio::spawn(task.run(shutdown_rx.clone()))));
        }

        let command_config = &blueprint.command_channel;
        if command_config.enabled {
            let source = open_source(&command_config.source)
                .await
                .map_err(|e| CliError::setup("command channel", e.to_string()))?;
            let channel = CommandChannel::from_config(
                source,
                LoggingLed::new("status"),
                motor.clone(),
                blueprint.actuator.max_duty,
                command_config,
            )
            .with_metrics(Arc::clone(&actuation_metrics));
            actuation_handles.push((
                "command_channel",
                tokio::spawn(channel.run(shutdown_rx.clone())),
            ));
        }

        // Producers last, so nothing they publish goes unobserved
        let producers = ProducerGroup::from_blueprint(
            blueprint,
            &store,
            &barrier,
            queue.as_ref(),
            shutdown_rx.clone(),
        )
        .map_err(|e| CliError::setup("producers", e.to_string()))?;

        info!(
            producers = producers.len(),
            max_rounds = ?self.config.max_rounds,
            timeout = ?self.config.timeout,
            "Node running"
        );

        // Round loop
        let timeout = self.config.timeout;
        let deadline = async move {
            match timeout {
                Some(t) => tokio::time::sleep(t).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(stop, deadline);

        let mut aggregator = RoundStatsAggregator::new();
        let stop_reason = loop {
            tokio::select! {
                report = report_rx.recv() => {
                    let Some(report) = report else {
                        break StopReason::DispatcherExited;
                    };
                    record_round(&report);
                    aggregator.update(&report);
                    info!(
                        round = report.round,
                        outcome = report.outcome.as_str(),
                        wait_ms = format!("{:.1}", report.wait_ms),
                        missing = report.missing.len(),
                        partial = report.partial,
                        "Round finished"
                    );

                    if let Some(max) = self.config.max_rounds {
                        if aggregator.total_rounds >= max {
                            info!(rounds = aggregator.total_rounds, "Reached max rounds limit");
                            break StopReason::MaxRounds;
                        }
                    }
                }
                _ = &mut stop => {
                    warn!("Received shutdown signal, stopping node...");
                    break StopReason::Signal;
                }
                _ = &mut deadline => {
                    warn!(timeout_secs = timeout.map(|t| t.as_secs()), "Node timed out");
                    break StopReason::Timeout;
                }
            }
        };

        // Shutdown
        info!("Shutting down node...");
        if shutdown_tx.send(true).is_err() {
            debug!("all tasks already gone");
        }

        let producer_metrics = producers.join().await;
        join_with_timeout("dispatcher", dispatcher_handle).await;
        for (name, handle) in actuation_handles {
            join_with_timeout(name, handle).await;
        }

        // rounds finished while the tasks were stopping still count
        if stop_reason != StopReason::MaxRounds {
            while let Ok(report) = report_rx.try_recv() {
                record_round(&report);
                aggregator.update(&report);
            }
        }

        let stats = NodeStats {
            duration: start_time.elapsed(),
            stop_reason,
            rounds: aggregator.summary(),
            producers: producer_metrics,
            dispatcher: dispatcher_metrics.snapshot(),
            actuation: actuation_metrics.snapshot(),
            queue: queue.as_ref().map(|q| q.stats()),
            final_duty: motor.duty(),
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            "Node shutdown complete"
        );

        Ok(stats)
    }
}

async fn join_with_timeout(name: &str, handle: JoinHandle<()>) {
    match tokio::time::timeout(JOIN_TIMEOUT, handle).await {
        Ok(Ok(())) => debug!(task = name, "task stopped"),
        Ok(Err(e)) => warn!(task = name, error = ?e, "task panicked"),
        Err(_) => warn!(task = name, "task did not stop in time"),
    }
}
