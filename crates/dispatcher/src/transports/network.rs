//! UdpTransport - one datagram per payload

use contracts::{ContractError, Transport, TransportErrorKind};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, instrument, warn};

/// Configuration for UdpTransport
#[derive(Debug, Clone)]
pub struct UdpTransportConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Max datagram size (UDP typically 65507 for IPv4)
    pub max_packet_size: usize,
}

impl UdpTransportConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let max_packet_size = params
            .get("max_packet_size")
            .and_then(|s| s.parse().ok())
            .unwrap_or(65000);

        Ok(Self {
            addr,
            max_packet_size,
        })
    }
}

/// Transport that sends payloads over UDP
pub struct UdpTransport {
    name: String,
    config: UdpTransportConfig,
    socket: Option<UdpSocket>,
}

impl UdpTransport {
    /// Bind an ephemeral port and connect it to the target
    #[instrument(name = "udp_transport_new", skip(name, config))]
    pub async fn new(name: impl Into<String>, config: UdpTransportConfig) -> std::io::Result<Self> {
        let name = name.into();
        let bind: SocketAddr = if config.addr.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(&config.addr).await?;

        debug!(
            transport = %name,
            target = %config.addr,
            "UdpTransport connected"
        );

        Ok(Self {
            name,
            config,
            socket: Some(socket),
        })
    }

    /// Create from params (for factory)
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = UdpTransportConfig::from_params(params)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidInput, e))?;
        Self::new(name, config).await
    }

    fn socket(&self) -> Result<&UdpSocket, ContractError> {
        self.socket.as_ref().ok_or_else(|| {
            ContractError::transport(&self.name, TransportErrorKind::LinkDown, "socket closed")
        })
    }
}

/// Map socket errors onto transport failure kinds
fn classify(e: &std::io::Error) -> TransportErrorKind {
    match e.kind() {
        ErrorKind::ConnectionRefused
        | ErrorKind::ConnectionReset
        | ErrorKind::NotConnected
        | ErrorKind::AddrNotAvailable => TransportErrorKind::LinkDown,
        ErrorKind::TimedOut | ErrorKind::WouldBlock => TransportErrorKind::Timeout,
        _ => TransportErrorKind::Io,
    }
}

impl Transport for UdpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "udp_transport_send",
        skip(self, payload),
        fields(transport = %self.name, bytes = payload.len())
    )]
    async fn send(&mut self, payload: &[u8]) -> Result<(), ContractError> {
        if payload.len() > self.config.max_packet_size {
            warn!(
                transport = %self.name,
                size = payload.len(),
                max = self.config.max_packet_size,
                "Payload exceeds datagram limit"
            );
            return Err(ContractError::transport(
                &self.name,
                TransportErrorKind::Rejected,
                format!(
                    "payload of {} bytes exceeds max_packet_size {}",
                    payload.len(),
                    self.config.max_packet_size
                ),
            ));
        }

        let socket = self.socket()?;
        match socket.send(payload).await {
            Ok(sent) => {
                debug!(transport = %self.name, bytes = sent, "Sent");
                Ok(())
            }
            Err(e) => Err(ContractError::transport(
                &self.name,
                classify(&e),
                e.to_string(),
            )),
        }
    }

    #[instrument(name = "udp_transport_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(transport = %self.name, "UdpTransport closed");
        Ok(())
    }
}
