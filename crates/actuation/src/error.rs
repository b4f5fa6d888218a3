//! Actuation error types

use contracts::FrameError;
use thiserror::Error;

/// Why an inbound command frame was discarded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Checksum present but wrong
    #[error("checksum mismatch: frame carries {received}, body hashes to {computed}")]
    Integrity { received: u32, computed: u32 },

    /// No readable checksum after the record
    #[error("checksum missing or unreadable: {raw:?}")]
    MissingChecksum { raw: String },

    /// Line is not a braced record at all
    #[error("line is not a command frame")]
    Unframed,

    /// Body verified but is not a valid command
    #[error("malformed command: {message}")]
    Decode { message: String },

    /// Duty cycle beyond the PWM resolution
    #[error("duty cycle {duty} exceeds max_duty {max}")]
    OutOfRange { duty: u16, max: u16 },

    /// No terminator within the frame size limit
    #[error("frame exceeds {limit} bytes without a terminator")]
    Oversized { limit: usize },
}

impl CommandError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Log category: checksum problems vs structural ones
    pub fn category(&self) -> &'static str {
        match self {
            CommandError::Integrity { .. } | CommandError::MissingChecksum { .. } => {
                "integrity_failure"
            }
            CommandError::Unframed
            | CommandError::Decode { .. }
            | CommandError::OutOfRange { .. }
            | CommandError::Oversized { .. } => "decode_failure",
        }
    }

    pub fn is_integrity(&self) -> bool {
        self.category() == "integrity_failure"
    }
}

impl From<FrameError> for CommandError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::Unframed => CommandError::Unframed,
            FrameError::BadChecksumField { raw } => CommandError::MissingChecksum { raw },
            FrameError::Mismatch { received, computed } => {
                CommandError::Integrity { received, computed }
            }
        }
    }
}

/// Actuation-specific errors
#[derive(Debug, Error)]
pub enum ActuationError {
    /// Command source could not be opened
    #[error("failed to open command source '{source_name}': {message}")]
    SourceOpen {
        source_name: String,
        message: String,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ActuationError {
    pub fn source_open(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceOpen {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, ActuationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_errors_map_to_categories() {
        let mismatch = CommandError::from(FrameError::Mismatch {
            received: 1,
            computed: 2,
        });
        assert_eq!(mismatch.category(), "integrity_failure");

        let missing = CommandError::from(FrameError::BadChecksumField { raw: String::new() });
        assert!(missing.is_integrity());

        assert_eq!(
            CommandError::from(FrameError::Unframed).category(),
            "decode_failure"
        );
        assert_eq!(
            CommandError::OutOfRange {
                duty: 2000,
                max: 1023
            }
            .category(),
            "decode_failure"
        );
        assert!(!CommandError::Oversized { limit: 512 }.is_integrity());
    }
}
