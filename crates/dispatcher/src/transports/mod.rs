//! Transport implementations
//!
//! Contains LogTransport, FileTransport, and UdpTransport, plus
//! `AnyTransport` for picking one from configuration.

mod file;
mod log;
mod network;

pub use self::file::{FileTransport, FileTransportConfig};
pub use self::log::LogTransport;
pub use self::network::{UdpTransport, UdpTransportConfig};

use contracts::{ContractError, Transport, TransportConfig, TransportKind};
use tracing::instrument;

use crate::error::DispatcherError;

/// Configured transport
pub enum AnyTransport {
    Log(LogTransport),
    File(FileTransport),
    Udp(UdpTransport),
}

impl AnyTransport {
    /// Build the transport named by `config.kind`
    #[instrument(name = "transport_from_config", skip(config), fields(kind = ?config.kind))]
    pub async fn from_config(config: &TransportConfig) -> Result<Self, DispatcherError> {
        let name = transport_name(config.kind);
        match config.kind {
            TransportKind::Log => Ok(Self::Log(LogTransport::new(name))),
            TransportKind::File => FileTransport::from_params(name, &config.params)
                .await
                .map(Self::File)
                .map_err(|e| DispatcherError::transport_creation(name, e.to_string())),
            TransportKind::Udp => UdpTransport::from_params(name, &config.params)
                .await
                .map(Self::Udp)
                .map_err(|e| DispatcherError::transport_creation(name, e.to_string())),
        }
    }
}

fn transport_name(kind: TransportKind) -> &'static str {
    match kind {
        TransportKind::Log => "log",
        TransportKind::File => "file",
        TransportKind::Udp => "udp",
    }
}

impl Transport for AnyTransport {
    fn name(&self) -> &str {
        match self {
            Self::Log(t) => t.name(),
            Self::File(t) => t.name(),
            Self::Udp(t) => t.name(),
        }
    }

    async fn send(&mut self, payload: &[u8]) -> Result<(), ContractError> {
        match self {
            Self::Log(t) => t.send(payload).await,
            Self::File(t) => t.send(payload).await,
            Self::Udp(t) => t.send(payload).await,
        }
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        match self {
            Self::Log(t) => t.close().await,
            Self::File(t) => t.close().await,
            Self::Udp(t) => t.close().await,
        }
    }
}
