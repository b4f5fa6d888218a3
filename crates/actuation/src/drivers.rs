//! Logging actuator drivers
//!
//! Stand-ins for the PWM motor and RGB LED. Both are cheap to clone and
//! clones share state, so the actuator task and the command channel can
//! drive the same motor.

use std::sync::atomic::{AtomicU16, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{ContractError, Led, Motor};
use tracing::info;

/// Motor that logs and remembers the last duty cycle
#[derive(Debug, Clone)]
pub struct LoggingMotor {
    name: String,
    max_duty: u16,
    duty: Arc<AtomicU16>,
    writes: Arc<AtomicU64>,
}

impl LoggingMotor {
    pub fn new(name: impl Into<String>, max_duty: u16) -> Self {
        Self {
            name: name.into(),
            max_duty,
            duty: Arc::new(AtomicU16::new(0)),
            writes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Last applied duty cycle
    pub fn duty(&self) -> u16 {
        self.duty.load(Ordering::Relaxed)
    }

    /// Number of accepted `set_speed` calls
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl Motor for LoggingMotor {
    fn set_speed(&mut self, duty: u16) -> Result<(), ContractError> {
        if duty > self.max_duty {
            return Err(ContractError::actuator(
                &self.name,
                format!("duty {duty} exceeds {}", self.max_duty),
            ));
        }
        self.duty.store(duty, Ordering::Relaxed);
        self.writes.fetch_add(1, Ordering::Relaxed);
        info!(motor = %self.name, duty, "motor speed set");
        Ok(())
    }
}

/// LED that logs and remembers the last colour
#[derive(Debug, Clone)]
pub struct LoggingLed {
    name: String,
    /// Packed 0x00RRGGBB
    color: Arc<AtomicU32>,
}

impl LoggingLed {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn color(&self) -> (u8, u8, u8) {
        let packed = self.color.load(Ordering::Relaxed);
        ((packed >> 16) as u8, (packed >> 8) as u8, packed as u8)
    }
}

impl Led for LoggingLed {
    fn set_color(&mut self, red: u8, green: u8, blue: u8) -> Result<(), ContractError> {
        let packed = (u32::from(red) << 16) | (u32::from(green) << 8) | u32::from(blue);
        self.color.store(packed, Ordering::Relaxed);
        info!(led = %self.name, red, green, blue, "led colour set");
        Ok(())
    }
}
