//! Layered error definitions
//!
//! Categorized by source: config / transport / actuator

use std::fmt;

use thiserror::Error;

/// Transport failure kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Link not up (no route, peer gone, not connected)
    LinkDown,
    /// Peer did not acknowledge in time
    Timeout,
    /// Peer refused the payload
    Rejected,
    /// Local I/O error
    Io,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportErrorKind::LinkDown => "link down",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Rejected => "rejected",
            TransportErrorKind::Io => "io",
        };
        f.write_str(s)
    }
}

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Transport Errors =====
    /// Send failed or link down
    #[error("transport '{transport}' failed ({kind}): {message}")]
    Transport {
        transport: String,
        kind: TransportErrorKind,
        message: String,
    },

    /// Payload could not be serialized
    #[error("payload serialize error: {message}")]
    Serialize { message: String },

    // ===== Actuator Errors =====
    /// Actuator driver refused a value
    #[error("actuator '{actuator}' error: {message}")]
    Actuator { actuator: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create transport error
    pub fn transport(
        transport: impl Into<String>,
        kind: TransportErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::Transport {
            transport: transport.into(),
            kind,
            message: message.into(),
        }
    }

    /// Create actuator error
    pub fn actuator(actuator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Actuator {
            actuator: actuator.into(),
            message: message.into(),
        }
    }

    /// Transport failure kind, if this is a transport error
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            Self::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
