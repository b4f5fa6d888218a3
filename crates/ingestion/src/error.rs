//! Ingestion error types

use contracts::SensorKind;
use thiserror::Error;

/// Ingestion errors
///
/// Only wiring mistakes end up here; a failed sample is data, not an error.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Two producers registered for the same kind
    #[error("producer for {kind} is already registered")]
    DuplicateProducer {
        /// Sensor kind
        kind: SensorKind,
    },

    /// Handoff queue attached to a kind whose readings carry no scalar
    #[error("{kind} readings carry no handoff value")]
    HandoffUnsupported {
        /// Sensor kind
        kind: SensorKind,
    },

    /// Sensor source kind differs from the configured producer kind
    #[error("source produces {source_kind}, producer configured for {configured}")]
    KindMismatch {
        configured: SensorKind,
        source_kind: SensorKind,
    },
}

impl IngestionError {
    pub fn kind_mismatch(configured: SensorKind, source_kind: SensorKind) -> Self {
        Self::KindMismatch {
            configured,
            source_kind,
        }
    }
}

/// Ingestion Result alias
pub type Result<T> = std::result::Result<T, IngestionError>;
