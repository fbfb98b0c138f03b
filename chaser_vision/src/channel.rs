// THEORY:
// A `CommandChannel` is the one-way link to the drivetrain. It is fire-and-forget:
// there is no acknowledgement and no retry. A failed send is the caller's to log;
// the next cycle simply sends again.
//
// Three channels ship with the library:
// 1.  `WriterChannel` frames commands onto any `io::Write`. The serial link is just
//     this over a serial port handle.
// 2.  `SerialChannel` (feature `serial`) opens the port by path or by index into
//     the list of available ports.
// 3.  `LogChannel` only logs. It is the dry-run transport for running without a
//     robot attached.

use crate::core_modules::command::Command;
use crate::error::ChannelError;
use serde::Deserialize;
use std::io::Write;
use tracing::info;

pub const DEFAULT_BAUD_RATE: u32 = 2_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

pub trait CommandChannel: Send {
    fn send(&mut self, command: &Command) -> Result<(), ChannelError>;
}

impl CommandChannel for Box<dyn CommandChannel> {
    fn send(&mut self, command: &Command) -> Result<(), ChannelError> {
        (**self).send(command)
    }
}

/// Where and how to open the serial link.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path. Takes precedence over `port_index`.
    pub port: Option<String>,
    /// Index into the enumerated serial ports.
    pub port_index: Option<usize>,
    pub baud_rate: u32,
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            port_index: None,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl SerialConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.baud_rate == 0 {
            return Err("serial.baud_rate must be greater than 0".to_string());
        }
        if matches!(&self.port, Some(p) if p.trim().is_empty()) {
            return Err("serial.port must not be empty".to_string());
        }
        Ok(())
    }
}

/// Writes newline-terminated command tokens to any byte sink.
pub struct WriterChannel<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> WriterChannel<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> CommandChannel for WriterChannel<W> {
    fn send(&mut self, command: &Command) -> Result<(), ChannelError> {
        let Some(frame) = command.wire_frame() else {
            return Ok(());
        };
        self.writer.write_all(frame.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Dry-run transport: every command becomes an `info!` event.
#[derive(Debug, Default)]
pub struct LogChannel {
    sent: u64,
}

impl LogChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl CommandChannel for LogChannel {
    fn send(&mut self, command: &Command) -> Result<(), ChannelError> {
        if let Some(token) = command.token() {
            self.sent += 1;
            info!(%command, token, seq = self.sent, "send");
        }
        Ok(())
    }
}

#[cfg(feature = "serial")]
pub use serial::SerialChannel;

#[cfg(feature = "serial")]
mod serial {
    use super::*;
    use serialport::SerialPort;
    use std::time::Duration;

    /// The drivetrain link over a serial port.
    pub type SerialChannel = WriterChannel<Box<dyn SerialPort>>;

    impl SerialChannel {
        pub fn open(config: &SerialConfig) -> Result<Self, ChannelError> {
            let path = match (&config.port, config.port_index) {
                (Some(path), _) => path.clone(),
                (None, index) => {
                    let index = index.unwrap_or(0);
                    let ports = serialport::available_ports()?;
                    ports
                        .get(index)
                        .map(|info| info.port_name.clone())
                        .ok_or(ChannelError::PortNotFound { index, available: ports.len() })?
                }
            };

            let port = serialport::new(path.as_str(), config.baud_rate)
                .timeout(Duration::from_millis(config.timeout_ms))
                .open()?;
            info!(port = %path, baud = config.baud_rate, "serial link open");
            Ok(WriterChannel::new(port))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_channel_frames_each_command() {
        let mut channel = WriterChannel::new(Vec::new());
        for command in [Command::TargetAcquired, Command::Forward, Command::Noop, Command::Align] {
            channel.send(&command).expect("in-memory write");
        }
        assert_eq!(channel.into_inner(), b"n\nw\n=\n".to_vec());
    }

    #[test]
    fn log_channel_counts_only_transmittable_commands() {
        let mut channel = LogChannel::new();
        channel.send(&Command::Noop).expect("log");
        channel.send(&Command::Nudge).expect("log");
        assert_eq!(channel.sent(), 1);
    }

    #[test]
    fn boxed_channels_forward() {
        let mut channel: Box<dyn CommandChannel> = Box::new(LogChannel::new());
        assert!(channel.send(&Command::Stop).is_ok());
    }

    #[test]
    fn serial_defaults() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 2_000_000);
        assert_eq!(config.timeout_ms, 100);
        assert!(config.validate().is_ok());
        assert!(SerialConfig { baud_rate: 0, ..SerialConfig::default() }.validate().is_err());
        let blank_port = SerialConfig { port: Some(" ".into()), ..SerialConfig::default() };
        assert!(blank_port.validate().is_err());
    }
}
