//! RoundReport - Dispatcher per-round outcome
//!
//! Emitted once per `await_full` cycle, consumed by the run statistics.

use serde::{Deserialize, Serialize};

use crate::SensorKind;

/// How a round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    /// Payload handed to the transport and acknowledged
    Sent,
    /// Transport reported an error; round dropped, barrier rearmed
    TransportFailed,
    /// Round timed out under the skip policy; nothing sent
    Skipped,
}

impl RoundOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            RoundOutcome::Sent => "sent",
            RoundOutcome::TransportFailed => "transport_failed",
            RoundOutcome::Skipped => "skipped",
        }
    }
}

/// Per-round dispatch metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundReport {
    /// Round number, starting at 1
    pub round: u64,

    pub outcome: RoundOutcome,

    /// Time spent in `await_full` (ms)
    pub wait_ms: f64,

    /// Time spent inside `Transport::send` (ms), `None` if nothing was sent
    pub dispatch_latency_ms: Option<f64>,

    /// Kinds without a fresh reading in the dispatched snapshot
    pub missing: Vec<SensorKind>,

    /// Dispatched from a timed-out round
    pub partial: bool,
}

impl RoundReport {
    pub fn is_dispatch_attempt(&self) -> bool {
        self.outcome != RoundOutcome::Skipped
    }
}
