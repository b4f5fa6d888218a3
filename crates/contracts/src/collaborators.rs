//! Collaborator traits
//!
//! The external modules the core calls into: sensor drivers, the uplink
//! transport, and the actuator drivers.

use crate::{ContractError, Reading, SampleFailure, SensorKind};

/// Sensor driver
///
/// A failed sample is a normal return value, not an error.
#[trait_variant::make(SensorSource: Send)]
pub trait LocalSensorSource {
    /// Kind this driver produces
    fn kind(&self) -> SensorKind;

    /// Acquire one sample
    async fn read(&mut self) -> Result<Reading, SampleFailure>;
}

/// Uplink transport (HTTP POST, serial link to a second controller, UDP...)
///
/// Timeouts are the transport's responsibility; the Dispatcher never retries.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Transport name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Send one serialized payload
    ///
    /// # Errors
    /// `ContractError::Transport` with the failure kind
    async fn send(&mut self, payload: &[u8]) -> Result<(), ContractError>;

    /// Release the link
    async fn close(&mut self) -> Result<(), ContractError>;
}

/// Motor PWM driver
pub trait Motor: Send {
    /// Apply a duty cycle in `0..=max_duty`
    fn set_speed(&mut self, duty: u16) -> Result<(), ContractError>;
}

/// RGB LED driver
pub trait Led: Send {
    fn set_color(&mut self, red: u8, green: u8, blue: u8) -> Result<(), ContractError>;
}
