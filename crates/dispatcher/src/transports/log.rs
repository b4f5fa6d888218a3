//! LogTransport - logs each payload via tracing

use contracts::{ContractError, Transport};
use tracing::{info, instrument};

/// Transport that logs payloads instead of sending them
pub struct LogTransport {
    name: String,
    sent: u64,
}

impl LogTransport {
    /// Create a new LogTransport with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sent: 0,
        }
    }

    /// Payloads logged so far
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl Transport for LogTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_transport_send",
        skip(self, payload),
        fields(transport = %self.name, bytes = payload.len())
    )]
    async fn send(&mut self, payload: &[u8]) -> Result<(), ContractError> {
        self.sent += 1;
        let text = String::from_utf8_lossy(payload);
        info!(
            transport = %self.name,
            seq = self.sent,
            payload = %text.trim_end(),
            "Telemetry payload"
        );
        Ok(())
    }

    #[instrument(name = "log_transport_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(transport = %self.name, sent = self.sent, "LogTransport closed");
        Ok(())
    }
}
