//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data Model
//! - `Reading` / `SampleFailure`: one sample from one sensor kind
//! - `CompositeSnapshot`: latest slot per kind, owned by the shared store
//! - `TelemetryPayload`: what the Dispatcher hands to the transport
//! - `RoundReport`: per-round Dispatcher outcome
//! - `Command`: inbound LED/motor command

mod blueprint;
mod collaborators;
mod command;
mod error;
mod framing;
mod reading;
mod round;
mod snapshot;

pub use blueprint::*;
pub use collaborators::{LocalSensorSource, LocalTransport, Led, Motor, SensorSource, Transport};
pub use command::Command;
pub use error::*;
pub use framing::{checksum, encode_crc32_line, verify_crc32_line, FrameError, FRAME_TERMINATOR, MAX_FRAME_LEN};
pub use reading::{FailureReason, Reading, SampleFailure, SensorKind};
pub use round::{RoundOutcome, RoundReport};
pub use snapshot::{CompositeSnapshot, SlotState, TelemetryPayload};
