//! Reading - Producer output
//!
//! One sample from one sensor kind, or the marker for a failed sample.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sensor kind (one producer task per kind)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Temperature + relative humidity (DHT11 class)
    Climate,
    /// PM2.5 particulate count (PMS5003 class)
    Particulate,
    /// Digital gas detector (MQ7 class)
    Gas,
}

impl SensorKind {
    /// All kinds, in slot order
    pub const ALL: [SensorKind; 3] = [SensorKind::Climate, SensorKind::Particulate, SensorKind::Gas];

    /// Number of kinds (slots in a `CompositeSnapshot`)
    pub const COUNT: usize = Self::ALL.len();

    /// Slot index inside a `CompositeSnapshot`
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            SensorKind::Climate => 0,
            SensorKind::Particulate => 1,
            SensorKind::Gas => 2,
        }
    }

    /// Stable lowercase name (logs, metric labels)
    pub const fn as_str(self) -> &'static str {
        match self {
            SensorKind::Climate => "climate",
            SensorKind::Particulate => "particulate",
            SensorKind::Gas => "gas",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single sensor reading
///
/// `Copy` on purpose: the store replaces a whole value under its lock, so a
/// reader never sees fields from two different samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reading {
    /// Temperature (°C) and relative humidity (%)
    Climate { temperature: f32, humidity: f32 },
    /// PM2.5 concentration (µg/m³)
    Particulate { pm2_5: u16 },
    /// Gas detector tripped
    Gas { detected: bool },
}

impl Reading {
    /// Kind discriminant
    pub const fn kind(&self) -> SensorKind {
        match self {
            Reading::Climate { .. } => SensorKind::Climate,
            Reading::Particulate { .. } => SensorKind::Particulate,
            Reading::Gas { .. } => SensorKind::Gas,
        }
    }

    /// A climate reading with a NaN (or infinite) field is a failed sample.
    pub fn is_valid(&self) -> bool {
        match self {
            Reading::Climate {
                temperature,
                humidity,
            } => temperature.is_finite() && humidity.is_finite(),
            Reading::Particulate { .. } | Reading::Gas { .. } => true,
        }
    }

    /// Scalar handed to the actuator queue, if this reading carries one
    pub fn handoff_value(&self) -> Option<u16> {
        match self {
            Reading::Particulate { pm2_5 } => Some(*pm2_5),
            _ => None,
        }
    }
}

/// Why a sample failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Sensor returned NaN / out-of-range values
    InvalidValue,
    /// Sensor did not answer in time
    Timeout,
    /// Bus or framing error talking to the sensor
    Bus,
    /// Sensor answered with a reading of another kind
    KindMismatch,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::InvalidValue => "invalid value",
            FailureReason::Timeout => "timeout",
            FailureReason::Bus => "bus error",
            FailureReason::KindMismatch => "kind mismatch",
        };
        f.write_str(s)
    }
}

/// Failed sample marker
///
/// A valid return value of `SensorSource::read`, not an exceptional error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleFailure {
    pub kind: SensorKind,
    pub reason: FailureReason,
}

impl SampleFailure {
    pub fn new(kind: SensorKind, reason: FailureReason) -> Self {
        Self { kind, reason }
    }
}

impl fmt::Display for SampleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sample failed: {}", self.kind, self.reason)
    }
}
