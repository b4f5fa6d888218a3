//! CommandChannel - framed inbound LED/motor commands
//!
//! Per line: `AwaitFrame -> Validate -> Decode -> Apply`. A frame that fails
//! validation or decoding is discarded before any collaborator is touched.
//! The channel shares nothing with the sensing pipeline.
//!
//! Frames are bounded: a line that runs past `max_frame_len` without a
//! terminator is dropped as a decode failure and the rest of it is skipped.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    verify_crc32_line, Command, CommandChannelConfig, Led, Motor, FRAME_TERMINATOR, MAX_FRAME_LEN,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::error::{ActuationError, CommandError, Result};
use crate::metrics::ActuationMetrics;

/// Boxed line source (stdin or a file)
pub type CommandSource = Box<dyn AsyncBufRead + Send + Unpin>;

/// Open `"stdin"` or a file path as a command source
pub async fn open_source(source: &str) -> Result<CommandSource> {
    if source == "stdin" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(Path::new(source))
        .await
        .map_err(|e| ActuationError::source_open(source, e.to_string()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Validate and decode one frame
///
/// The checksum is checked before any JSON parsing happens.
pub fn decode_frame(line: &[u8], max_duty: u16) -> std::result::Result<Command, CommandError> {
    let body = verify_crc32_line(line)?;
    let command: Command =
        serde_json::from_slice(body).map_err(|e| CommandError::decode(e.to_string()))?;
    if command.duty_cycle > max_duty {
        return Err(CommandError::OutOfRange {
            duty: command.duty_cycle,
            max: max_duty,
        });
    }
    Ok(command)
}

/// What `next_frame` produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameRead {
    /// A terminated line is in the buffer
    Line,
    /// Terminated line with nothing but whitespace
    Blank,
    /// Limit reached without a terminator; buffer dropped
    Oversized,
}

/// Reads frames from `reader` and applies them to an LED and a motor
pub struct CommandChannel<R, L, M> {
    reader: R,
    led: L,
    motor: M,
    max_duty: u16,
    poll_interval: Duration,
    max_frame_len: usize,
    buf: Vec<u8>,
    /// Skipping the tail of an oversized line
    discarding: bool,
    metrics: Arc<ActuationMetrics>,
}

impl<R, L, M> CommandChannel<R, L, M>
where
    R: AsyncBufRead + Send + Unpin,
    L: Led,
    M: Motor,
{
    pub fn new(reader: R, led: L, motor: M, max_duty: u16, poll_interval: Duration) -> Self {
        Self {
            reader,
            led,
            motor,
            max_duty,
            poll_interval,
            max_frame_len: MAX_FRAME_LEN,
            buf: Vec::with_capacity(128),
            discarding: false,
            metrics: Arc::new(ActuationMetrics::new()),
        }
    }

    pub fn from_config(
        reader: R,
        led: L,
        motor: M,
        max_duty: u16,
        config: &CommandChannelConfig,
    ) -> Self {
        Self::new(reader, led, motor, max_duty, config.poll_interval())
            .with_max_frame_len(config.max_frame_len)
    }

    /// Frame size ceiling in bytes, terminator excluded; 0 is raised to 1
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len.max(1);
        self
    }

    /// Share counters with another actuation task
    pub fn with_metrics(mut self, metrics: Arc<ActuationMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<ActuationMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Validate, decode and apply one received line
    pub fn handle_line(&mut self, line: &[u8]) -> std::result::Result<Command, CommandError> {
        let command = match decode_frame(line, self.max_duty) {
            Ok(command) => command,
            Err(e) => {
                self.metrics.record_reject(&e);
                metrics::counter!("airnode_commands_total", "status" => e.category())
                    .increment(1);
                warn!(category = e.category(), error = %e, "command frame discarded");
                return Err(e);
            }
        };

        self.apply(&command);
        Ok(command)
    }

    fn apply(&mut self, command: &Command) {
        let led = self
            .led
            .set_color(command.red, command.green, command.blue);
        let motor = self.motor.set_speed(command.duty_cycle);

        match (led, motor) {
            (Ok(()), Ok(())) => {
                self.metrics.record_command();
                metrics::counter!("airnode_commands_total", "status" => "applied").increment(1);
                debug!(?command, "command applied");
            }
            (led, motor) => {
                self.metrics.record_apply_failure();
                for e in [led.err(), motor.err()].into_iter().flatten() {
                    warn!(error = %e, "command collaborator failed");
                }
            }
        }
    }

    /// Read one frame, waiting `poll_interval` whenever the source is dry
    ///
    /// `self.buf` never holds more than `max_frame_len + 1` bytes. A partial
    /// line at EOF stays buffered until its terminator shows up.
    async fn next_frame(&mut self) -> Result<FrameRead> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            let (used, terminated) = match available.iter().position(|b| *b == FRAME_TERMINATOR) {
                Some(i) => (i + 1, true),
                None => (available.len(), false),
            };

            if self.discarding {
                self.reader.consume(used);
                self.discarding = !terminated;
                continue;
            }

            // room for the longest frame plus its terminator
            let room = self.max_frame_len + 1 - self.buf.len();
            let take = used.min(room);
            self.buf.extend_from_slice(&available[..take]);
            self.reader.consume(take);

            if terminated && take == used {
                return Ok(if self.buf.trim_ascii().is_empty() {
                    FrameRead::Blank
                } else {
                    FrameRead::Line
                });
            }
            if self.buf.len() > self.max_frame_len {
                self.buf.clear();
                self.discarding = true;
                return Ok(FrameRead::Oversized);
            }
        }
    }

    fn reject_oversized(&mut self) {
        let e = CommandError::Oversized {
            limit: self.max_frame_len,
        };
        self.metrics.record_reject(&e);
        metrics::counter!("airnode_commands_total", "status" => e.category()).increment(1);
        warn!(category = e.category(), error = %e, "command frame discarded");
    }

    /// Process frames until shutdown
    #[instrument(name = "command_channel_run", skip(self, shutdown), fields(poll_ms = self.poll_interval.as_millis() as u64))]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Command channel started");

        while !*shutdown.borrow() {
            tokio::select! {
                frame = self.next_frame() => match frame {
                    Ok(FrameRead::Line) => {
                        let line = std::mem::take(&mut self.buf);
                        let _ = self.handle_line(&line);
                        self.buf = line;
                        self.buf.clear();
                    }
                    Ok(FrameRead::Blank) => self.buf.clear(),
                    Ok(FrameRead::Oversized) => self.reject_oversized(),
                    Err(e) => {
                        warn!(error = %e, "command source read failed");
                        self.buf.clear();
                        tokio::time::sleep(self.poll_interval).await;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        info!(
            applied = snapshot.commands_applied,
            integrity_rejects = snapshot.integrity_rejects,
            decode_rejects = snapshot.decode_rejects,
            "Command channel stopped"
        );
    }
}
