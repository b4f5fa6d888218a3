//! # Dispatcher
//!
//! Round consumer and uplink transports.
//!
//! Responsibilities:
//! - Wait for a full round on the `ReadinessBarrier`
//! - Serialize the store into a `TelemetryPayload` (plain JSON or CRC32 line)
//! - Hand it to a `Transport`, then rearm regardless of the outcome

pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod payload;
pub mod transports;

pub use contracts::{RoundReport, TelemetryPayload, Transport};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::DispatcherError;
pub use metrics::{DispatcherMetrics, MetricsSnapshot};
pub use transports::{
    AnyTransport, FileTransport, FileTransportConfig, LogTransport, UdpTransport,
    UdpTransportConfig,
};
