//! Node run statistics.

use std::fmt;
use std::time::Duration;

use contracts::SensorKind;
use observability::RoundSummary;
use sync_engine::QueueStats;

/// Why the run loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxRounds,
    Timeout,
    Signal,
    /// Report channel closed before any other stop condition
    DispatcherExited,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::MaxRounds => "max rounds reached",
            StopReason::Timeout => "timeout",
            StopReason::Signal => "shutdown signal",
            StopReason::DispatcherExited => "dispatcher exited",
        };
        f.write_str(s)
    }
}

/// Statistics from a node run
#[derive(Debug, Clone)]
pub struct NodeStats {
    pub duration: Duration,
    pub stop_reason: StopReason,
    pub rounds: RoundSummary,
    pub producers: Vec<(SensorKind, ingestion::MetricsSnapshot)>,
    pub dispatcher: dispatcher::MetricsSnapshot,
    pub actuation: actuation::MetricsSnapshot,
    /// None when no producer feeds the handoff queue
    pub queue: Option<QueueStats>,
    /// Motor duty at shutdown
    pub final_duty: u16,
}

impl NodeStats {
    /// Dispatched rounds per minute
    pub fn rounds_per_minute(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.rounds.sent as f64 / secs * 60.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Node Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Stopped by: {}", self.stop_reason);
        println!("   ├─ Rounds/min: {:.2}", self.rounds_per_minute());
        println!("   └─ Bytes sent: {}", self.dispatcher.bytes_sent);

        println!("\n{}", self.rounds);

        println!("Producers");
        for (i, (kind, m)) in self.producers.iter().enumerate() {
            let prefix = if i + 1 == self.producers.len() { "└─" } else { "├─" };
            println!(
                "   {} {}: samples={} failures={} coalesced={}",
                prefix, kind, m.samples, m.failures, m.coalesced
            );
        }

        if let Some(queue) = &self.queue {
            println!("\nHandoff queue");
            println!("   ├─ Accepted: {}", queue.accepted);
            println!("   ├─ Rejected: {}", queue.rejected);
            println!("   ├─ Evicted: {}", queue.evicted);
            println!("   └─ Popped: {}", queue.popped);
        }

        println!("\nActuation");
        println!("   ├─ Values applied: {}", self.actuation.values_applied);
        println!("   ├─ Commands applied: {}", self.actuation.commands_applied);
        println!(
            "   ├─ Commands rejected: integrity={} decode={}",
            self.actuation.integrity_rejects, self.actuation.decode_rejects
        );
        println!("   └─ Final duty: {}", self.final_duty);

        println!();
    }
}
