//! Round metrics
//!
//! Prometheus recording and in-memory statistics built from the
//! Dispatcher's `RoundReport`s.

use std::collections::BTreeMap;

use contracts::{RoundOutcome, RoundReport, SensorKind};
use metrics::{counter, gauge, histogram};

/// Record one dispatcher round
///
/// Called once per `RoundReport` by whoever drains the report channel.
pub fn record_round(report: &RoundReport) {
    counter!("airnode_rounds_total", "outcome" => report.outcome.as_str()).increment(1);
    gauge!("airnode_last_round").set(report.round as f64);

    histogram!("airnode_round_wait_ms").record(report.wait_ms);
    if let Some(latency) = report.dispatch_latency_ms {
        histogram!("airnode_dispatch_latency_ms").record(latency);
    }

    if report.partial {
        counter!("airnode_rounds_partial_total").increment(1);
    }
    gauge!("airnode_round_missing_kinds").set(report.missing.len() as f64);
    for kind in &report.missing {
        counter!("airnode_kind_missing_total", "kind" => kind.as_str()).increment(1);
    }
}

/// Publish static node facts once at start-up
pub fn record_node_info(device_id: &str, participants: &[SensorKind]) {
    gauge!("airnode_node_info", "device_id" => device_id.to_string()).set(1.0);
    gauge!("airnode_barrier_capacity").set(participants.len() as f64);
}

/// Per-run round statistics
#[derive(Debug, Clone, Default)]
pub struct RoundStatsAggregator {
    pub total_rounds: u64,
    pub sent: u64,
    pub transport_failed: u64,
    pub skipped: u64,
    /// Rounds dispatched from an incomplete barrier
    pub partial: u64,

    /// Time to full, ms (rounds that reached the barrier only)
    pub wait_stats: RunningStats,

    /// `Transport::send` latency, ms
    pub latency_stats: RunningStats,

    pub missing_counts: BTreeMap<SensorKind, u64>,
}

impl RoundStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, report: &RoundReport) {
        self.total_rounds += 1;
        match report.outcome {
            RoundOutcome::Sent => self.sent += 1,
            RoundOutcome::TransportFailed => self.transport_failed += 1,
            RoundOutcome::Skipped => self.skipped += 1,
        }
        if report.partial {
            self.partial += 1;
        }

        // a timed-out wait is the timeout, not a time to full
        if report.outcome != RoundOutcome::Skipped && !report.partial {
            self.wait_stats.push(report.wait_ms);
        }
        if let Some(latency) = report.dispatch_latency_ms {
            self.latency_stats.push(latency);
        }

        for kind in &report.missing {
            *self.missing_counts.entry(*kind).or_insert(0) += 1;
        }
    }

    /// Rounds that reached the transport
    pub fn dispatch_attempts(&self) -> u64 {
        self.sent + self.transport_failed
    }

    pub fn summary(&self) -> RoundSummary {
        let attempts = self.dispatch_attempts();
        RoundSummary {
            total_rounds: self.total_rounds,
            sent: self.sent,
            transport_failed: self.transport_failed,
            skipped: self.skipped,
            partial: self.partial,
            failure_rate: if attempts > 0 {
                self.transport_failed as f64 / attempts as f64 * 100.0
            } else {
                0.0
            },
            time_to_full_ms: StatsSummary::from(&self.wait_stats),
            dispatch_latency_ms: StatsSummary::from(&self.latency_stats),
            missing_counts: self.missing_counts.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Round statistics summary
#[derive(Debug, Clone, Default)]
pub struct RoundSummary {
    pub total_rounds: u64,
    pub sent: u64,
    pub transport_failed: u64,
    pub skipped: u64,
    pub partial: u64,
    /// Transport failures as % of dispatch attempts
    pub failure_rate: f64,
    pub time_to_full_ms: StatsSummary,
    pub dispatch_latency_ms: StatsSummary,
    pub missing_counts: BTreeMap<SensorKind, u64>,
}

impl std::fmt::Display for RoundSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Round Summary ===")?;
        writeln!(f, "Rounds: {}", self.total_rounds)?;
        writeln!(f, "Sent: {}", self.sent)?;
        writeln!(
            f,
            "Transport failures: {} ({:.2}%)",
            self.transport_failed, self.failure_rate
        )?;
        writeln!(f, "Skipped (timeout): {}", self.skipped)?;
        writeln!(f, "Partial: {}", self.partial)?;
        writeln!(f, "Time to full (ms): {}", self.time_to_full_ms)?;
        writeln!(f, "Dispatch latency (ms): {}", self.dispatch_latency_ms)?;

        if !self.missing_counts.is_empty() {
            writeln!(f, "Missing per kind:")?;
            for (kind, count) in &self.missing_counts {
                writeln!(f, "  {}: {}", kind, count)?;
            }
        }

        Ok(())
    }
}

/// Summary of a `RunningStats`
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(round: u64, outcome: RoundOutcome, wait_ms: f64) -> RoundReport {
        RoundReport {
            round,
            outcome,
            wait_ms,
            dispatch_latency_ms: (outcome != RoundOutcome::Skipped).then_some(2.0),
            missing: Vec::new(),
            partial: false,
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_counts_outcomes() {
        let mut agg = RoundStatsAggregator::new();
        agg.update(&report(1, RoundOutcome::Sent, 2000.0));
        agg.update(&report(2, RoundOutcome::TransportFailed, 4000.0));
        agg.update(&RoundReport {
            missing: vec![SensorKind::Climate],
            ..report(3, RoundOutcome::Skipped, 120_000.0)
        });

        assert_eq!(agg.total_rounds, 3);
        assert_eq!(agg.sent, 1);
        assert_eq!(agg.transport_failed, 1);
        assert_eq!(agg.skipped, 1);
        assert_eq!(agg.dispatch_attempts(), 2);
        assert_eq!(agg.missing_counts.get(&SensorKind::Climate), Some(&1));

        // the skipped round's timeout is not a time to full
        assert_eq!(agg.wait_stats.count(), 2);
        assert!((agg.wait_stats.mean() - 3000.0).abs() < 1e-9);
        assert_eq!(agg.latency_stats.count(), 2);
    }

    #[test]
    fn test_summary_display() {
        let mut agg = RoundStatsAggregator::new();
        agg.update(&report(1, RoundOutcome::Sent, 2000.0));
        agg.update(&report(2, RoundOutcome::TransportFailed, 2000.0));

        let output = agg.summary().to_string();
        assert!(output.contains("Rounds: 2"));
        assert!(output.contains("Transport failures: 1 (50.00%)"));
        assert!(output.contains("n=2"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = RoundStatsAggregator::new().summary();
        assert_eq!(summary.failure_rate, 0.0);
        assert_eq!(summary.time_to_full_ms.to_string(), "N/A");
    }
}
