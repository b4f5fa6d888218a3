//! # Actuation
//!
//! Everything that drives the motor and the LED.
//!
//! Responsibilities:
//! - `ActuatorTask`: HandoffQueue consumer, PM2.5 -> motor duty
//! - `CommandChannel`: CRC32-framed inbound commands -> LED + motor
//! - Logging drivers standing in for PWM/LED hardware

pub mod actuator;
pub mod command;
pub mod drivers;
pub mod error;
pub mod metrics;

pub use actuator::{ActuatorTask, DutyMap};
pub use command::{decode_frame, open_source, CommandChannel, CommandSource};
pub use contracts::{Command, Led, Motor};
pub use drivers::{LoggingLed, LoggingMotor};
pub use error::{ActuationError, CommandError, Result};
pub use metrics::{ActuationMetrics, MetricsSnapshot};
