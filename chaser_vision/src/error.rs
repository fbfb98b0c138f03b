//! Error types for chaser_vision.
//!
//! Each failure kind maps to one recovery policy in the control loop: a
//! `CaptureError` degrades one camera to a no-op for a cycle, a `ChannelError`
//! drops one outgoing command, and a `DecisionError` is handed back to whoever
//! asked for an avoid-object decision.

use thiserror::Error;

/// The frame for one camera could not be produced this cycle.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Frame unavailable from camera {camera}")]
    FrameUnavailable { camera: String },

    #[error(
        "Frame from camera {camera} is {actual_width}x{actual_height}, \
         expected {expected_width}x{expected_height}"
    )]
    DimensionMismatch {
        camera: String,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("Capture backend error: {0}")]
    Backend(String),
}

/// A command could not be handed to the transport.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("No serial port at index {index} ({available} available)")]
    PortNotFound { index: usize, available: usize },
}

#[cfg(feature = "serial")]
impl From<serialport::Error> for ChannelError {
    fn from(err: serialport::Error) -> Self {
        ChannelError::Serial(err.to_string())
    }
}

/// The avoid-object rule set had no well-defined answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecisionError {
    #[error("No obstacle columns within the steering band")]
    NoObservations,

    #[error("No unique most common obstacle column among {candidates:?}")]
    AmbiguousMode { candidates: Vec<u8> },

    #[error("Obstacle column {column} has no avoidance maneuver")]
    UnsteerableColumn { column: u8 },
}

/// Configuration could not be read or failed validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Umbrella error for callers that do not care which stage failed.
#[derive(Error, Debug)]
pub enum ChaserError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Decision error: {0}")]
    Decision(#[from] DecisionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
