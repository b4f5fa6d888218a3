//! ProducerGroup - spawns and tracks the node's producer tasks

use std::collections::BTreeMap;
use std::sync::Arc;

use contracts::{NodeBlueprint, SensorKind, SensorSource};
use sync_engine::{HandoffQueue, ReadinessBarrier, SharedReadingStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::error::{IngestionError, Result};
use crate::metrics::{MetricsSnapshot, ProducerMetrics};
use crate::producer::{ensure_kind, ProducerTask};
use crate::simulated::SimulatedSensor;

/// Running producers, one per sensor kind
pub struct ProducerGroup {
    handles: Vec<(SensorKind, JoinHandle<()>)>,
    metrics: BTreeMap<SensorKind, Arc<ProducerMetrics>>,
    shutdown: watch::Receiver<bool>,
}

impl ProducerGroup {
    /// Create an empty group; producers stop when `shutdown` flips to true
    pub fn new(shutdown: watch::Receiver<bool>) -> Self {
        Self {
            handles: Vec::new(),
            metrics: BTreeMap::new(),
            shutdown,
        }
    }

    /// Spawn one simulated producer per configured entry
    ///
    /// The producer flagged `handoff` is wired to `queue` when one is given.
    #[instrument(
        name = "producer_group_from_blueprint",
        skip_all,
        fields(producers = blueprint.producers.len())
    )]
    pub fn from_blueprint(
        blueprint: &NodeBlueprint,
        store: &Arc<SharedReadingStore>,
        barrier: &Arc<ReadinessBarrier>,
        queue: Option<&Arc<HandoffQueue<u16>>>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let mut group = Self::new(shutdown);

        for config in &blueprint.producers {
            let sensor = SimulatedSensor::new(config.kind, &config.simulation);
            ensure_kind(config.kind, &sensor)?;

            let mut task = ProducerTask::new(
                sensor,
                config.period(),
                Arc::clone(store),
                Arc::clone(barrier),
            );
            if let (true, Some(queue)) = (config.handoff, queue) {
                task = task.with_handoff(Arc::clone(queue))?;
            }
            group.spawn(task)?;
        }

        info!(count = group.len(), "producers spawned");
        Ok(group)
    }

    /// Spawn `task` onto the runtime
    ///
    /// # Errors
    /// `DuplicateProducer` if a producer for the same kind is already running.
    pub fn spawn<S>(&mut self, task: ProducerTask<S>) -> Result<()>
    where
        S: SensorSource + Sync + 'static,
    {
        let kind = task.kind();
        if self.metrics.contains_key(&kind) {
            return Err(IngestionError::DuplicateProducer { kind });
        }

        debug!(kind = %kind, period_ms = task.period().as_millis() as u64, "spawning producer");
        self.metrics.insert(kind, task.metrics());
        let handle = tokio::spawn(task.run(self.shutdown.clone()));
        self.handles.push((kind, handle));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Kinds with a running producer, in kind order
    pub fn kinds(&self) -> Vec<SensorKind> {
        self.metrics.keys().copied().collect()
    }

    /// Counter snapshots per kind
    pub fn metrics(&self) -> Vec<(SensorKind, MetricsSnapshot)> {
        self.metrics
            .iter()
            .map(|(kind, m)| (*kind, m.snapshot()))
            .collect()
    }

    /// Wait for every producer to exit (after shutdown has been signalled)
    ///
    /// Returns the final counter snapshots.
    #[instrument(name = "producer_group_join", skip(self))]
    pub async fn join(mut self) -> Vec<(SensorKind, MetricsSnapshot)> {
        for (kind, handle) in &mut self.handles {
            if let Err(e) = handle.await {
                error!(kind = %kind, error = ?e, "Producer task panicked");
            }
        }
        debug!("all producers stopped");
        self.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::ScriptedSensor;
    use contracts::Reading;
    use std::time::Duration;
    use sync_engine::BarrierWait;

    #[tokio::test]
    async fn test_duplicate_kind_rejected() {
        let store = Arc::new(SharedReadingStore::new());
        let barrier = Arc::new(ReadinessBarrier::new(&SensorKind::ALL));
        let (tx, rx) = watch::channel(false);
        let mut group = ProducerGroup::new(rx);

        let make = || {
            ProducerTask::new(
                ScriptedSensor::new(SensorKind::Gas, vec![Ok(Reading::Gas { detected: false })]),
                Duration::from_secs(2),
                store.clone(),
                barrier.clone(),
            )
        };

        group.spawn(make()).unwrap();
        assert!(matches!(
            group.spawn(make()),
            Err(IngestionError::DuplicateProducer {
                kind: SensorKind::Gas
            })
        ));

        tx.send(true).unwrap();
        group.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_producers_complete_a_round() {
        let store = Arc::new(SharedReadingStore::new());
        let barrier = Arc::new(ReadinessBarrier::new(&SensorKind::ALL));
        let (tx, rx) = watch::channel(false);
        let mut group = ProducerGroup::new(rx);

        let script = |kind| match kind {
            SensorKind::Climate => vec![Ok(Reading::Climate {
                temperature: 20.0,
                humidity: 50.0,
            })],
            SensorKind::Particulate => vec![Ok(Reading::Particulate { pm2_5: 30 })],
            SensorKind::Gas => vec![Ok(Reading::Gas { detected: false })],
        };
        for kind in SensorKind::ALL {
            let task = ProducerTask::new(
                ScriptedSensor::new(kind, script(kind)),
                Duration::from_secs(5),
                store.clone(),
                barrier.clone(),
            );
            group.spawn(task).unwrap();
        }
        assert_eq!(group.kinds(), SensorKind::ALL.to_vec());

        assert_eq!(
            barrier.await_full(Some(Duration::from_secs(1))).await,
            BarrierWait::Ready
        );
        let snapshot = store.snapshot();
        assert!(snapshot.missing(&SensorKind::ALL).is_empty());

        tx.send(true).unwrap();
        group.join().await;
    }
}
