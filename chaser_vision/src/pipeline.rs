// THEORY:
// The `pipeline` module is the top-level API of the chaser. It owns the cameras, the
// arbiter state and the command channel, and exposes one operation: `run_cycle`.
// The caller (the driver binary, or a test) decides how often to call it and when
// to stop.
//
// One cycle, in order:
// 1.  Capture one frame per camera, in configuration order. A camera that fails to
//     deliver a frame contributes `Noop` to every mode this cycle and nothing else
//     happens to it.
// 2.  Evaluate the enabled modes against the captured frames: avoid-line, then
//     avoid-object, then the target strategy. Decisions are concatenated
//     mode-major, so every camera's avoidance opinion outranks every camera's
//     chase opinion.
// 3.  Arbitrate, then transmit each resulting command. A failed send is logged and
//     the rest are still attempted.
// 4.  Return a `CycleReport` carrying the masks for display.

use crate::arbiter::{Arbiter, ArbiterState, SearchConfig};
use crate::capture::FrameSource;
use crate::channel::CommandChannel;
use crate::config::{LocatorKind, RobotConfig, TargetStrategy};
use crate::core_modules::blob_locator::SingleCentroidLocator;
use crate::core_modules::camera_unit::CameraDecisionUnit;
use crate::core_modules::color_segmenter::{ColorRange, Mask};
use crate::core_modules::command::Command;
use crate::error::ConfigError;
use tracing::{info, warn};

// Re-export key data structures for the public API.
pub use crate::arbiter::Report;

/// A color range together with the name it was configured under.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedRange {
    pub name: String,
    pub range: ColorRange,
}

impl NamedRange {
    pub fn new(name: impl Into<String>, range: ColorRange) -> Self {
        Self { name: name.into(), range }
    }
}

/// Which modes run each cycle and with which colors.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub target: NamedRange,
    pub strategy: TargetStrategy,
    pub line: Option<NamedRange>,
    pub obstacle: Option<NamedRange>,
    pub search: SearchConfig,
}

impl PipelineConfig {
    /// Chase `target` with no avoidance and the default search bounds.
    pub fn chase(target: NamedRange) -> Self {
        Self {
            target,
            strategy: TargetStrategy::Chase,
            line: None,
            obstacle: None,
            search: SearchConfig::default(),
        }
    }

    pub fn from_robot(config: &RobotConfig) -> Result<Self, ConfigError> {
        let named = |name: &String| -> Result<NamedRange, ConfigError> {
            config
                .colors
                .get(name)
                .map(|range| NamedRange::new(name.clone(), *range))
                .ok_or_else(|| {
                    ConfigError::Invalid(format!("color '{}' is not defined in [colors]", name))
                })
        };
        Ok(Self {
            target: named(&config.target_color)?,
            strategy: config.strategy,
            line: config.line_color.as_ref().map(named).transpose()?,
            obstacle: config.obstacle_color.as_ref().map(named).transpose()?,
            search: config.search,
        })
    }
}

/// A mask tagged `"<camera> <color>"`.
#[derive(Debug, Clone)]
pub struct LabeledMask {
    pub label: String,
    pub mask: Mask,
}

/// What happened in one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub report: Report,
    /// Per-camera decisions, mode-major, in the order the arbiter saw them.
    pub decisions: Vec<Command>,
    /// The arbitrated commands handed to the channel, in order.
    pub sent: Vec<Command>,
    /// How many of `sent` the channel rejected.
    pub dropped: usize,
    pub masks: Vec<LabeledMask>,
}

/// One camera's contribution to a cycle.
#[derive(Debug, Clone, Default)]
pub struct UnitOutcome {
    pub line: Option<Command>,
    pub obstacle: Option<Command>,
    pub target: Command,
    pub masks: Vec<LabeledMask>,
}

impl UnitOutcome {
    /// The outcome of a camera that produced no frame.
    pub fn degraded(config: &PipelineConfig) -> Self {
        Self {
            line: config.line.as_ref().map(|_| Command::Noop),
            obstacle: config.obstacle.as_ref().map(|_| Command::Noop),
            target: Command::Noop,
            masks: Vec::new(),
        }
    }
}

/// Captures one frame from `unit` and runs every enabled mode against it.
pub fn evaluate_unit(unit: &mut CameraDecisionUnit, config: &PipelineConfig) -> UnitOutcome {
    let frame = match unit.capture() {
        Ok(frame) => frame,
        Err(e) => {
            warn!(
                camera = unit.name(),
                error = %e,
                "capture failed, camera degraded to no-op"
            );
            return UnitOutcome::degraded(config);
        }
    };

    let mut outcome = UnitOutcome::default();
    let label = |color: &str| format!("{} {}", unit.name(), color);

    if let Some(line) = &config.line {
        let (mask, command) = unit.avoid_line(&frame, &line.range);
        outcome.masks.push(LabeledMask { label: label(&line.name), mask });
        outcome.line = Some(command);
    }

    if let Some(obstacle) = &config.obstacle {
        let (mask, decision) = unit.avoid_object(&frame, &obstacle.range);
        outcome.masks.push(LabeledMask { label: label(&obstacle.name), mask });
        outcome.obstacle = Some(decision.unwrap_or_else(|e| {
            warn!(camera = unit.name(), error = %e, "avoid-object undecided");
            Command::Noop
        }));
    }

    let (mask, target) = match config.strategy {
        TargetStrategy::Chase => unit.chase(&frame, &config.target.range),
        TargetStrategy::Face => unit.face_object(&frame, &config.target.range),
    };
    outcome.masks.push(LabeledMask { label: label(&config.target.name), mask });
    outcome.target = target;
    outcome
}

/// Flattens per-camera outcomes into the mode-major decision list.
pub fn assemble(outcomes: Vec<UnitOutcome>) -> (Vec<Command>, Vec<LabeledMask>) {
    let mut decisions: Vec<Command> = outcomes.iter().filter_map(|o| o.line).collect();
    decisions.extend(outcomes.iter().filter_map(|o| o.obstacle));
    decisions.extend(outcomes.iter().map(|o| o.target));
    let masks = outcomes.into_iter().flat_map(|o| o.masks).collect();
    (decisions, masks)
}

/// Sends every command; returns how many the channel rejected.
pub fn transmit(channel: &mut dyn CommandChannel, commands: &[Command]) -> usize {
    let mut dropped = 0;
    for command in commands {
        if let Err(e) = channel.send(command) {
            warn!(%command, error = %e, "send failed, command dropped");
            dropped += 1;
        }
    }
    dropped
}

/// Arbitration, transmission and mode-change logging shared by both pipelines.
pub(crate) struct CycleCore {
    pub(crate) config: PipelineConfig,
    arbiter: Arbiter,
    state: ArbiterState,
    channel: Box<dyn CommandChannel>,
    last_report: Option<Report>,
    cycles: u64,
}

impl CycleCore {
    pub(crate) fn new(config: PipelineConfig, channel: Box<dyn CommandChannel>) -> Self {
        Self {
            arbiter: Arbiter::new(config.search),
            config,
            state: ArbiterState::default(),
            channel,
            last_report: None,
            cycles: 0,
        }
    }

    pub(crate) fn finish(&mut self, outcomes: Vec<UnitOutcome>) -> CycleReport {
        let (decisions, masks) = assemble(outcomes);
        let report = Arbiter::mode_of(&decisions);
        if self.last_report != Some(report) {
            info!(cycle = self.cycles, ?report, "mode change");
            self.last_report = Some(report);
        }

        let sent = self.arbiter.arbitrate(&mut self.state, &decisions);
        let dropped = transmit(self.channel.as_mut(), &sent);
        self.cycles += 1;

        CycleReport { report, decisions, sent, dropped, masks }
    }

    pub(crate) fn state(&self) -> &ArbiterState {
        &self.state
    }

    pub(crate) fn cycles(&self) -> u64 {
        self.cycles
    }

    pub(crate) fn last_report(&self) -> Option<Report> {
        self.last_report
    }
}

/// Builds one decision unit per configured camera, in configuration order.
pub fn build_units(
    config: &RobotConfig,
    sources: Vec<Box<dyn FrameSource>>,
) -> Result<Vec<CameraDecisionUnit>, ConfigError> {
    if sources.len() != config.cameras.len() {
        return Err(ConfigError::Invalid(format!(
            "{} cameras configured but {} frame sources supplied",
            config.cameras.len(),
            sources.len()
        )));
    }
    Ok(config
        .cameras
        .iter()
        .zip(sources)
        .map(|(camera, source)| {
            let unit = CameraDecisionUnit::new(
                camera.name.clone(),
                camera.role,
                source,
                camera.width,
                camera.height,
            )
            .with_line_min_y(config.avoid_line.min_y);
            match config.locator {
                LocatorKind::Multi => unit,
                LocatorKind::Single => unit.with_locator(Box::new(SingleCentroidLocator)),
            }
        })
        .collect())
}

/// The sequential cycle driver.
pub struct ChasePipeline {
    units: Vec<CameraDecisionUnit>,
    core: CycleCore,
}

impl ChasePipeline {
    pub fn new(
        units: Vec<CameraDecisionUnit>,
        config: PipelineConfig,
        channel: Box<dyn CommandChannel>,
    ) -> Self {
        Self { units, core: CycleCore::new(config, channel) }
    }

    /// Wires up a pipeline from a validated configuration. `sources` must line up
    /// with `config.cameras`.
    pub fn from_config(
        config: &RobotConfig,
        sources: Vec<Box<dyn FrameSource>>,
        channel: Box<dyn CommandChannel>,
    ) -> Result<Self, ConfigError> {
        let units = build_units(config, sources)?;
        Ok(Self::new(units, PipelineConfig::from_robot(config)?, channel))
    }

    pub fn run_cycle(&mut self) -> CycleReport {
        let config = &self.core.config;
        let outcomes: Vec<UnitOutcome> =
            self.units.iter_mut().map(|unit| evaluate_unit(unit, config)).collect();
        self.core.finish(outcomes)
    }

    /// The mode of the most recent cycle, without running one.
    pub fn last_report(&self) -> Option<Report> {
        self.core.last_report()
    }

    pub fn state(&self) -> &ArbiterState {
        self.core.state()
    }

    pub fn cycles(&self) -> u64 {
        self.core.cycles()
    }

    pub fn units(&self) -> &[CameraDecisionUnit] {
        &self.units
    }
}
