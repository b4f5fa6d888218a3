//! FileTransport - appends payloads to a local file, one per line

use contracts::{ContractError, Transport, TransportErrorKind};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, instrument};

/// Configuration for FileTransport
#[derive(Debug, Clone)]
pub struct FileTransportConfig {
    /// Output file, created if missing
    pub path: PathBuf,
}

impl FileTransportConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .ok_or_else(|| "missing 'path' parameter".to_string())?;
        Ok(Self { path })
    }
}

/// Transport that appends payloads to a file
pub struct FileTransport {
    name: String,
    config: FileTransportConfig,
    file: Option<File>,
    /// A previous append failed partway; the file may end mid-line
    torn: bool,
}

impl FileTransport {
    /// Open (or create) the output file in append mode
    pub async fn new(name: impl Into<String>, config: FileTransportConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)
            .await?;

        Ok(Self {
            name: name.into(),
            config,
            file: Some(file),
            torn: false,
        })
    }

    /// Create from params map (for factory)
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileTransportConfig::from_params(params)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        Self::new(name, config).await
    }

    async fn append(&mut self, payload: &[u8]) -> std::io::Result<()> {
        let file = self.file.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotConnected, "file already closed")
        })?;
        let record = line_record(payload, self.torn);
        self.torn = true;
        file.write_all(&record).await?;
        file.flush().await?;
        self.torn = false;
        Ok(())
    }
}

/// One complete line: `payload` plus terminator, written in a single call
///
/// After a torn append the record starts with a newline so it never joins
/// the fragment left behind.
fn line_record(payload: &[u8], after_torn: bool) -> Vec<u8> {
    let mut record = Vec::with_capacity(payload.len() + 2);
    if after_torn {
        record.push(b'\n');
    }
    record.extend_from_slice(payload);
    if payload.last() != Some(&b'\n') {
        record.push(b'\n');
    }
    record
}

impl Transport for FileTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_transport_send",
        skip(self, payload),
        fields(transport = %self.name, bytes = payload.len())
    )]
    async fn send(&mut self, payload: &[u8]) -> Result<(), ContractError> {
        self.append(payload).await.map_err(|e| {
            error!(transport = %self.name, path = %self.config.path.display(), error = %e, "Append failed");
            let kind = if e.kind() == std::io::ErrorKind::NotConnected {
                TransportErrorKind::LinkDown
            } else {
                TransportErrorKind::Io
            };
            ContractError::transport(&self.name, kind, e.to_string())
        })
    }

    #[instrument(name = "file_transport_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
        }
        debug!(transport = %self.name, "FileTransport closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_transport_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("telemetry.jsonl");
        let config = FileTransportConfig { path: path.clone() };

        let mut transport = FileTransport::new("test_file", config).await.unwrap();
        transport.send(br#"{"round":1}"#).await.unwrap();
        transport.send(b"{\"round\":2}123\n").await.unwrap();
        transport.close().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines, vec![r#"{"round":1}"#, r#"{"round":2}123"#]);
    }

    #[tokio::test]
    async fn test_send_after_close_is_link_down() {
        let dir = tempdir().unwrap();
        let config = FileTransportConfig {
            path: dir.path().join("t.jsonl"),
        };
        let mut transport = FileTransport::new("test_file", config).await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send(b"{}").await.unwrap_err();
        assert_eq!(err.transport_kind(), Some(TransportErrorKind::LinkDown));
    }

    #[test]
    fn test_line_record_is_whole_line() {
        assert_eq!(line_record(b"{}", false), b"{}\n");
        assert_eq!(line_record(b"{}1\n", false), b"{}1\n");
        assert_eq!(line_record(b"{}", true), b"\n{}\n");
    }

    #[tokio::test]
    async fn test_append_after_torn_write_starts_fresh_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        let config = FileTransportConfig { path: path.clone() };
        let mut transport = FileTransport::new("test_file", config).await.unwrap();

        // fragment of an append that failed partway
        transport
            .file
            .as_mut()
            .unwrap()
            .write_all(br#"{"round":1,"pm"#)
            .await
            .unwrap();
        transport.torn = true;

        transport.send(br#"{"round":2}"#).await.unwrap();
        transport.send(br#"{"round":3}"#).await.unwrap();
        transport.close().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(
            lines,
            vec![r#"{"round":1,"pm"#, r#"{"round":2}"#, r#"{"round":3}"#]
        );
    }

    #[test]
    fn test_config_requires_path() {
        assert!(FileTransportConfig::from_params(&HashMap::new()).is_err());
    }
}
