// THEORY:
// This file is the main entry point for the `chaser_vision` library crate. It
// exposes the perception-to-decision stack of a small color-chasing robot: frames go
// in, single-character motion commands come out on a command channel.
//
// The primary goal is to export `ChasePipeline` (and its concurrent sibling
// `ParallelChasePipeline`) together with the two collaborator traits,
// `FrameSource` and `CommandChannel`, as the high-level interface. The perception
// stages (`core_modules`) stay public so they can be exercised one at a time, but
// a driver only needs the pipeline, the configuration and the traits.
//
// The library does not open cameras itself. Device access lives in the driver
// binary, which keeps this crate testable with scripted frames.

pub mod arbiter;
pub mod capture;
pub mod channel;
pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use arbiter::{Arbiter, ArbiterState, Report, SearchConfig};
pub use capture::{Frame, FrameSource};
pub use channel::{CommandChannel, LogChannel, SerialConfig, WriterChannel};
#[cfg(feature = "serial")]
pub use channel::SerialChannel;
pub use config::{CameraConfig, RobotConfig, TargetStrategy};
pub use core_modules::camera_unit::{CameraDecisionUnit, CameraRole, DecisionMode};
pub use core_modules::color_segmenter::{ColorRange, Mask};
pub use core_modules::command::Command;
pub use error::{CaptureError, ChannelError, ChaserError, ConfigError, DecisionError};
pub use parallel_pipeline::ParallelChasePipeline;
pub use pipeline::{ChasePipeline, CycleReport, LabeledMask, NamedRange, PipelineConfig};
