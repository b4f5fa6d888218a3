//! CRC32 line framing
//!
//! Wire shape shared by the serial link in both directions:
//! `{...json...}<decimal crc32 of the json bytes>\n`

use thiserror::Error;

/// Record terminator
pub const FRAME_TERMINATOR: u8 = b'\n';

/// Default frame size ceiling, matching the firmware's 512-byte JSON document
pub const MAX_FRAME_LEN: usize = 512;

/// Frame-level failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Line does not look like `{...}`
    #[error("frame is not a braced record")]
    Unframed,

    /// Nothing (or garbage) after the closing brace
    #[error("frame checksum missing or unreadable: {raw:?}")]
    BadChecksumField { raw: String },

    /// Checksum present but does not match the body
    #[error("crc32 mismatch: frame carries {received}, body hashes to {computed}")]
    Mismatch { received: u32, computed: u32 },
}

impl FrameError {
    /// Checksum problems, as opposed to a structurally broken line
    pub fn is_integrity(&self) -> bool {
        !matches!(self, FrameError::Unframed)
    }
}

/// CRC32 (IEEE) of `body`
#[inline]
pub fn checksum(body: &[u8]) -> u32 {
    crc32fast::hash(body)
}

/// Append decimal checksum and terminator to `body`
pub fn encode_crc32_line(body: &[u8]) -> Vec<u8> {
    let crc = checksum(body).to_string();
    let mut out = Vec::with_capacity(body.len() + crc.len() + 1);
    out.extend_from_slice(body);
    out.extend_from_slice(crc.as_bytes());
    out.push(FRAME_TERMINATOR);
    out
}

/// Verify a received line and return the checksummed body (`{` through `}`)
///
/// The terminator and surrounding whitespace are ignored.
pub fn verify_crc32_line(line: &[u8]) -> Result<&[u8], FrameError> {
    let line = line.trim_ascii();
    if line.first() != Some(&b'{') {
        return Err(FrameError::Unframed);
    }
    let close = line
        .iter()
        .rposition(|b| *b == b'}')
        .ok_or(FrameError::Unframed)?;

    let (body, tail) = line.split_at(close + 1);
    let tail = tail.trim_ascii();

    let received = std::str::from_utf8(tail)
        .ok()
        .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| FrameError::BadChecksumField {
            raw: String::from_utf8_lossy(tail).into_owned(),
        })?;

    let computed = checksum(body);
    if received != computed {
        return Err(FrameError::Mismatch { received, computed });
    }
    Ok(body)
}
