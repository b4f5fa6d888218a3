//! CompositeSnapshot - Shared store contents and Dispatcher output
//!
//! One slot per sensor kind plus the serialized payload shape.

use serde::{Deserialize, Serialize};

use crate::{FailureReason, Reading, SampleFailure, SensorKind};

/// State of one snapshot slot
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlotState {
    /// Never written since start-up
    #[default]
    Vacant,
    /// Most recent sample succeeded
    Fresh { reading: Reading },
    /// Most recent sample failed
    Failed { failure: SampleFailure },
}

impl SlotState {
    /// Reading, if the last sample succeeded
    pub fn reading(&self) -> Option<&Reading> {
        match self {
            SlotState::Fresh { reading } => Some(reading),
            _ => None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, SlotState::Fresh { .. })
    }
}

/// Sample outcome to slot: NaN-bearing readings are recorded as failures
impl From<Result<Reading, SampleFailure>> for SlotState {
    fn from(sample: Result<Reading, SampleFailure>) -> Self {
        match sample {
            Ok(reading) if reading.is_valid() => SlotState::Fresh { reading },
            Ok(reading) => SlotState::Failed {
                failure: SampleFailure::new(reading.kind(), FailureReason::InvalidValue),
            },
            Err(failure) => SlotState::Failed { failure },
        }
    }
}

/// Latest value from every producer kind
///
/// Owned by `SharedReadingStore`; everyone else works on copies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeSnapshot {
    slots: [SlotState; SensorKind::COUNT],
    /// Write count per slot, for diagnostics
    revisions: [u64; SensorKind::COUNT],
}

impl CompositeSnapshot {
    /// Empty snapshot (all slots vacant)
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `kind`
    #[inline]
    pub fn get(&self, kind: SensorKind) -> &SlotState {
        &self.slots[kind.index()]
    }

    /// Replace the slot for `kind`
    #[inline]
    pub fn set(&mut self, kind: SensorKind, state: SlotState) {
        self.slots[kind.index()] = state;
        self.revisions[kind.index()] += 1;
    }

    /// Number of writes to `kind` since start-up
    pub fn revision(&self, kind: SensorKind) -> u64 {
        self.revisions[kind.index()]
    }

    /// Kinds among `expected` whose slot holds no usable reading
    pub fn missing(&self, expected: &[SensorKind]) -> Vec<SensorKind> {
        expected
            .iter()
            .copied()
            .filter(|k| !self.get(*k).is_fresh())
            .collect()
    }
}

/// Outbound payload
///
/// Missing or failed values serialize as `null` and are listed in `missing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    pub device_id: String,
    pub round: u64,
    pub timestamp: String,
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub pm2_5: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub gas: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub missing: Vec<SensorKind>,
    /// True when sent after a round timeout with an incomplete barrier
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub partial: bool,
}

impl TelemetryPayload {
    /// Build from a snapshot copy
    pub fn from_snapshot(
        device_id: impl Into<String>,
        round: u64,
        timestamp: impl Into<String>,
        snapshot: &CompositeSnapshot,
        expected: &[SensorKind],
    ) -> Self {
        let (temperature, humidity) = match snapshot.get(SensorKind::Climate).reading() {
            Some(Reading::Climate {
                temperature,
                humidity,
            }) => (Some(*temperature), Some(*humidity)),
            _ => (None, None),
        };
        let pm2_5 = match snapshot.get(SensorKind::Particulate).reading() {
            Some(Reading::Particulate { pm2_5 }) => Some(*pm2_5),
            _ => None,
        };
        let gas = match snapshot.get(SensorKind::Gas).reading() {
            Some(Reading::Gas { detected }) => Some(*detected),
            _ => None,
        };

        Self {
            device_id: device_id.into(),
            round,
            timestamp: timestamp.into(),
            temperature,
            humidity,
            pm2_5,
            gas,
            missing: snapshot.missing(expected),
            partial: false,
        }
    }
}
