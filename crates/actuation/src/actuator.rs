//! ActuatorTask - HandoffQueue consumer driving the motor
//!
//! Values are applied in pop order, which is push order. The task never
//! talks back to the queue or the producer.

use std::sync::Arc;

use contracts::{ActuatorConfig, Motor};
use sync_engine::HandoffQueue;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::metrics::ActuationMetrics;

/// Clamped linear PM2.5 -> duty map
///
/// At or below `pm_low` gives `duty_min`, at or above `pm_high` gives
/// `duty_max`, straight line in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyMap {
    pub pm_low: u16,
    pub pm_high: u16,
    pub duty_min: u16,
    pub duty_max: u16,
}

impl DutyMap {
    pub fn from_config(config: &ActuatorConfig) -> Self {
        Self {
            pm_low: config.pm_low,
            pm_high: config.pm_high,
            duty_min: config.duty_min,
            duty_max: config.duty_max,
        }
    }

    pub fn duty_for(&self, pm2_5: u16) -> u16 {
        if pm2_5 <= self.pm_low {
            return self.duty_min;
        }
        if pm2_5 >= self.pm_high {
            return self.duty_max;
        }
        // pm_low < pm2_5 < pm_high here, so the span is non-zero
        let span_pm = u32::from(self.pm_high - self.pm_low);
        let span_duty = i64::from(self.duty_max) - i64::from(self.duty_min);
        let offset = i64::from(pm2_5 - self.pm_low) * span_duty / i64::from(span_pm);
        (i64::from(self.duty_min) + offset) as u16
    }
}

/// Pops handoff values and applies them to a motor
pub struct ActuatorTask<M> {
    motor: M,
    queue: Arc<HandoffQueue<u16>>,
    map: DutyMap,
    initial_duty: u16,
    metrics: Arc<ActuationMetrics>,
}

impl<M: Motor> ActuatorTask<M> {
    pub fn new(motor: M, queue: Arc<HandoffQueue<u16>>, config: &ActuatorConfig) -> Self {
        Self {
            motor,
            queue,
            map: DutyMap::from_config(config),
            initial_duty: config.initial_duty,
            metrics: Arc::new(ActuationMetrics::new()),
        }
    }

    /// Share counters with another actuation task
    pub fn with_metrics(mut self, metrics: Arc<ActuationMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<ActuationMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn duty_map(&self) -> DutyMap {
        self.map
    }

    /// Apply one handoff value; returns the duty written
    pub fn apply(&mut self, pm2_5: u16) -> Option<u16> {
        let duty = self.map.duty_for(pm2_5);
        match self.motor.set_speed(duty) {
            Ok(()) => {
                self.metrics.record_value(true);
                metrics::gauge!("airnode_actuator_duty").set(f64::from(duty));
                debug!(pm2_5, duty, "handoff value applied");
                Some(duty)
            }
            Err(e) => {
                self.metrics.record_value(false);
                warn!(pm2_5, duty, error = %e, "motor refused duty");
                None
            }
        }
    }

    /// Apply `initial_duty`, then consume the queue until shutdown
    #[instrument(name = "actuator_run", skip(self, shutdown), fields(capacity = self.queue.capacity()))]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        match self.motor.set_speed(self.initial_duty) {
            Ok(()) => info!(duty = self.initial_duty, "Actuator started"),
            Err(e) => warn!(duty = self.initial_duty, error = %e, "initial duty refused"),
        }

        while !*shutdown.borrow() {
            tokio::select! {
                value = self.queue.pop(None) => {
                    if let Some(pm2_5) = value {
                        self.apply(pm2_5);
                    }
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
            applied = snapshot.values_applied,
            failures = snapshot.apply_failures,
            "Actuator stopped"
        );
    }
}
