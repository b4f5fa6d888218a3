//! NodeBlueprint - Config Loader output
//!
//! Describes the whole node: producers, dispatch policy, handoff queue,
//! actuator mapping, command channel and uplink transport.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::SensorKind;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Node identity
    pub node: NodeConfig,

    /// One entry per participating sensor kind
    pub producers: Vec<ProducerConfig>,

    /// Dispatcher policy
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Producer -> actuator queue
    #[serde(default)]
    pub handoff: HandoffConfig,

    /// Motor mapping
    #[serde(default)]
    pub actuator: ActuatorConfig,

    /// Inbound command channel
    #[serde(default)]
    pub command_channel: CommandChannelConfig,

    /// Uplink
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Node identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Identifier stamped on every payload
    pub device_id: String,
}

/// Producer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// Sensor kind
    pub kind: SensorKind,

    /// Sampling period (ms); defaults per kind when omitted
    #[serde(default)]
    pub period_ms: Option<u64>,

    /// Also push the sampled scalar to the handoff queue
    #[serde(default)]
    pub handoff: bool,

    /// Simulated sensor behaviour
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl ProducerConfig {
    /// Effective sampling period
    pub fn period(&self) -> Duration {
        Duration::from_millis(
            self.period_ms
                .unwrap_or_else(|| default_period_ms(self.kind)),
        )
    }
}

/// Default cadence per kind
pub fn default_period_ms(kind: SensorKind) -> u64 {
    match kind {
        SensorKind::Climate => 5_000,
        SensorKind::Particulate => 2_000,
        SensorKind::Gas => 2_000,
    }
}

/// Simulated sensor parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Probability that a sample fails, in [0, 1]
    #[serde(default)]
    pub failure_rate: f64,

    /// RNG seed (random when omitted)
    #[serde(default)]
    pub seed: Option<u64>,
}

/// What the Dispatcher does when a round times out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundTimeoutPolicy {
    /// Rearm and wait for a fresh round; nothing is sent
    #[default]
    Skip,
    /// Send whatever the store holds, flagged partial
    Partial,
}

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Bounded wait for a full round (ms), 0 = wait forever
    #[serde(default = "default_round_timeout_ms")]
    pub round_timeout_ms: u64,

    /// Minimum delay after each dispatch attempt (ms)
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Timeout policy
    #[serde(default)]
    pub on_timeout: RoundTimeoutPolicy,
}

impl DispatchConfig {
    /// Round timeout, `None` = unbounded
    pub fn round_timeout(&self) -> Option<Duration> {
        (self.round_timeout_ms > 0).then(|| Duration::from_millis(self.round_timeout_ms))
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            round_timeout_ms: default_round_timeout_ms(),
            min_interval_ms: default_min_interval_ms(),
            on_timeout: RoundTimeoutPolicy::default(),
        }
    }
}

fn default_round_timeout_ms() -> u64 {
    120_000
}

fn default_min_interval_ms() -> u64 {
    60_000
}

/// Full-queue policy for the handoff queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaturationPolicy {
    /// Wait up to `push_timeout_ms` for space, then reject the new item
    #[default]
    Reject,
    /// Evict the oldest item to make room, never wait
    DropOldest,
}

/// Handoff queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffConfig {
    /// Fixed capacity
    #[serde(default = "default_handoff_capacity")]
    pub capacity: usize,

    /// Full-queue policy
    #[serde(default)]
    pub policy: SaturationPolicy,

    /// Bounded wait for space under `reject` (ms)
    #[serde(default = "default_push_timeout_ms")]
    pub push_timeout_ms: u64,
}

impl HandoffConfig {
    pub fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.push_timeout_ms)
    }
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            capacity: default_handoff_capacity(),
            policy: SaturationPolicy::default(),
            push_timeout_ms: default_push_timeout_ms(),
        }
    }
}

fn default_handoff_capacity() -> usize {
    10
}

fn default_push_timeout_ms() -> u64 {
    50
}

/// Actuator configuration
///
/// PM2.5 maps linearly onto duty between (`pm_low`, `duty_min`) and
/// (`pm_high`, `duty_max`), clamped at both ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActuatorConfig {
    /// PWM resolution ceiling (10-bit by default)
    #[serde(default = "default_max_duty")]
    pub max_duty: u16,

    /// Duty applied once when the actuator task starts
    #[serde(default)]
    pub initial_duty: u16,

    #[serde(default = "default_pm_low")]
    pub pm_low: u16,

    #[serde(default = "default_pm_high")]
    pub pm_high: u16,

    #[serde(default)]
    pub duty_min: u16,

    #[serde(default = "default_max_duty")]
    pub duty_max: u16,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            max_duty: default_max_duty(),
            initial_duty: 0,
            pm_low: default_pm_low(),
            pm_high: default_pm_high(),
            duty_min: 0,
            duty_max: default_max_duty(),
        }
    }
}

fn default_max_duty() -> u16 {
    1023
}

fn default_pm_low() -> u16 {
    12
}

fn default_pm_high() -> u16 {
    150
}

/// Command channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandChannelConfig {
    #[serde(default)]
    pub enabled: bool,

    /// `"stdin"` or a file path to read frames from
    #[serde(default = "default_command_source")]
    pub source: String,

    /// Poll interval (ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Longest accepted frame (bytes, terminator excluded)
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
}

impl CommandChannelConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for CommandChannelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            source: default_command_source(),
            poll_interval_ms: default_poll_interval_ms(),
            max_frame_len: default_max_frame_len(),
        }
    }
}

fn default_command_source() -> String {
    "stdin".to_string()
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_max_frame_len() -> usize {
    crate::MAX_FRAME_LEN
}

/// Transport type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Log payloads via tracing
    #[default]
    Log,
    /// Append payloads to a file
    File,
    /// UDP datagrams
    Udp,
}

/// Payload framing on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Bare JSON object
    #[default]
    Plain,
    /// JSON + decimal CRC32 + newline
    Crc32Line,
}

/// Transport configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,

    #[serde(default)]
    pub framing: Framing,

    /// Transport-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl NodeBlueprint {
    /// Sensor kinds taking part in each round, in config order
    pub fn participants(&self) -> Vec<SensorKind> {
        self.producers.iter().map(|p| p.kind).collect()
    }

    /// The producer feeding the handoff queue, if any
    pub fn handoff_producer(&self) -> Option<&ProducerConfig> {
        self.producers.iter().find(|p| p.handoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn producer(kind: SensorKind) -> ProducerConfig {
        ProducerConfig {
            kind,
            period_ms: None,
            handoff: false,
            simulation: SimulationConfig::default(),
        }
    }

    #[test]
    fn default_periods_per_kind() {
        assert_eq!(
            producer(SensorKind::Climate).period(),
            Duration::from_secs(5)
        );
        assert_eq!(
            producer(SensorKind::Particulate).period(),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn dispatch_zero_timeout_is_unbounded() {
        let cfg = DispatchConfig {
            round_timeout_ms: 0,
            ..Default::default()
        };
        assert!(cfg.round_timeout().is_none());
        assert_eq!(
            DispatchConfig::default().round_timeout(),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn participants_and_handoff() {
        let mut pm = producer(SensorKind::Particulate);
        pm.handoff = true;
        let bp = NodeBlueprint {
            version: ConfigVersion::V1,
            node: NodeConfig {
                device_id: "n".into(),
            },
            producers: vec![producer(SensorKind::Climate), pm, producer(SensorKind::Gas)],
            dispatch: DispatchConfig::default(),
            handoff: HandoffConfig::default(),
            actuator: ActuatorConfig::default(),
            command_channel: CommandChannelConfig::default(),
            transport: TransportConfig::default(),
        };

        assert_eq!(bp.participants(), SensorKind::ALL.to_vec());
        assert_eq!(
            bp.handoff_producer().map(|p| p.kind),
            Some(SensorKind::Particulate)
        );
    }
}
