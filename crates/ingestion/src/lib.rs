//! # Ingestion
//!
//! Producer side of the node.
//!
//! Responsibilities:
//! - One `ProducerTask` per sensor kind, sampling on its own period
//! - Publish each sample (or failure marker) into `SharedReadingStore`
//! - Signal `ReadinessBarrier` after every publish
//! - Feed the handoff queue from the particulate producer
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{ProducerTask, SimulatedSensor};
//!
//! let sensor = SimulatedSensor::new(SensorKind::Gas, &SimulationConfig::default());
//! let task = ProducerTask::new(sensor, Duration::from_secs(2), store, barrier);
//! tokio::spawn(task.run(shutdown_rx));
//! ```

mod error;
mod group;
mod metrics;
mod producer;
mod simulated;

// Re-exports
pub use error::{IngestionError, Result};
pub use group::ProducerGroup;
pub use metrics::{MetricsSnapshot, ProducerMetrics};
pub use producer::{ensure_kind, CycleReport, ProducerState, ProducerTask};
pub use simulated::{ScriptedSensor, SimulatedSensor};
