//! Payload encoding: JSON body, optionally CRC32-line framed

use contracts::{encode_crc32_line, ContractError, Framing, TelemetryPayload};

/// Serialize `payload` for the wire
pub fn encode(payload: &TelemetryPayload, framing: Framing) -> Result<Vec<u8>, ContractError> {
    let body = serde_json::to_vec(payload).map_err(|e| ContractError::Serialize {
        message: e.to_string(),
    })?;
    Ok(match framing {
        Framing::Plain => body,
        Framing::Crc32Line => encode_crc32_line(&body),
    })
}
