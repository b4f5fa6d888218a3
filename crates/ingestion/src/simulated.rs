//! Simulated sensor sources
//!
//! Used when no hardware is attached, and by tests.

use contracts::{
    FailureReason, Reading, SampleFailure, SensorKind, SensorSource, SimulationConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

/// Random-walk sensor with a configurable failure rate
///
/// Climate failures come back as NaN readings, the way a DHT-class driver
/// reports them; the other kinds fail with an explicit `SampleFailure`.
pub struct SimulatedSensor {
    kind: SensorKind,
    rng: StdRng,
    failure_rate: f64,
    temperature: f32,
    humidity: f32,
    pm2_5: f32,
}

impl SimulatedSensor {
    pub fn new(kind: SensorKind, config: &SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            kind,
            rng,
            failure_rate: config.failure_rate.clamp(0.0, 1.0),
            temperature: 22.0,
            humidity: 45.0,
            pm2_5: 20.0,
        }
    }

    fn sample(&mut self) -> Result<Reading, SampleFailure> {
        let failed = self.failure_rate > 0.0 && self.rng.random_bool(self.failure_rate);

        match self.kind {
            SensorKind::Climate => {
                if failed {
                    return Ok(Reading::Climate {
                        temperature: f32::NAN,
                        humidity: f32::NAN,
                    });
                }
                self.temperature =
                    (self.temperature + self.rng.random_range(-0.3..=0.3)).clamp(-10.0, 45.0);
                self.humidity = (self.humidity + self.rng.random_range(-1.0..=1.0)).clamp(5.0, 95.0);
                Ok(Reading::Climate {
                    temperature: self.temperature,
                    humidity: self.humidity,
                })
            }
            SensorKind::Particulate => {
                if failed {
                    return Err(SampleFailure::new(self.kind, FailureReason::Timeout));
                }
                self.pm2_5 = (self.pm2_5 + self.rng.random_range(-8.0..=8.0)).clamp(0.0, 500.0);
                Ok(Reading::Particulate {
                    pm2_5: self.pm2_5.round() as u16,
                })
            }
            SensorKind::Gas => {
                if failed {
                    return Err(SampleFailure::new(self.kind, FailureReason::Bus));
                }
                Ok(Reading::Gas {
                    detected: self.rng.random_bool(0.05),
                })
            }
        }
    }
}

impl SensorSource for SimulatedSensor {
    fn kind(&self) -> SensorKind {
        self.kind
    }

    async fn read(&mut self) -> Result<Reading, SampleFailure> {
        let sample = self.sample();
        trace!(kind = %self.kind, ?sample, "simulated sample");
        sample
    }
}

/// Replays a fixed script of samples, cycling when exhausted
pub struct ScriptedSensor {
    kind: SensorKind,
    script: Vec<Result<Reading, SampleFailure>>,
    cursor: usize,
}

impl ScriptedSensor {
    pub fn new(kind: SensorKind, script: Vec<Result<Reading, SampleFailure>>) -> Self {
        Self {
            kind,
            script,
            cursor: 0,
        }
    }

    /// Samples read so far
    pub fn reads(&self) -> usize {
        self.cursor
    }
}

impl SensorSource for ScriptedSensor {
    fn kind(&self) -> SensorKind {
        self.kind
    }

    async fn read(&mut self) -> Result<Reading, SampleFailure> {
        if self.script.is_empty() {
            return Err(SampleFailure::new(self.kind, FailureReason::Timeout));
        }
        let sample = self.script[self.cursor % self.script.len()];
        self.cursor += 1;
        sample
    }
}
