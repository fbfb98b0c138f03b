// THEORY:
// `ParallelChasePipeline` runs the same cycle as `ChasePipeline`, but polls the
// cameras concurrently. Capture is the slow, blocking part of a cycle (each
// `get_frame` can wait up to a frame interval), so every camera gets its own
// blocking worker and the cycle costs roughly one frame interval instead of one
// per camera.
//
// Key architectural principles:
// 1.  **Same Semantics**: Concurrency changes latency, never results. Outcomes are
//     collected in input order (`buffered`, not `buffer_unordered`) and handed to
//     the same arbitration core as the sequential pipeline.
// 2.  **Bounded Fan-Out**: At most `num_cpus::get()` workers are in flight.
// 3.  **Ownership Round-Trip**: A unit is moved onto its worker and moved back with
//     the result. A worker that panics takes its unit with it; that camera is then
//     a permanent no-op and the rest of the robot keeps running.

use crate::capture::FrameSource;
use crate::channel::CommandChannel;
use crate::config::RobotConfig;
use crate::core_modules::camera_unit::CameraDecisionUnit;
use crate::error::ConfigError;
use crate::pipeline::{
    build_units, evaluate_unit, CycleCore, CycleReport, PipelineConfig, UnitOutcome,
};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{error, warn};

struct Slot {
    name: String,
    /// `None` once the unit's worker has panicked.
    unit: Option<CameraDecisionUnit>,
}

pub struct ParallelChasePipeline {
    slots: Vec<Slot>,
    core: CycleCore,
    shared_config: Arc<PipelineConfig>,
    max_in_flight: usize,
}

impl ParallelChasePipeline {
    pub fn new(
        units: Vec<CameraDecisionUnit>,
        config: PipelineConfig,
        channel: Box<dyn CommandChannel>,
    ) -> Self {
        let slots = units
            .into_iter()
            .map(|unit| Slot { name: unit.name().to_string(), unit: Some(unit) })
            .collect();
        Self {
            slots,
            shared_config: Arc::new(config.clone()),
            core: CycleCore::new(config, channel),
            max_in_flight: num_cpus::get().max(1),
        }
    }

    pub fn from_config(
        config: &RobotConfig,
        sources: Vec<Box<dyn FrameSource>>,
        channel: Box<dyn CommandChannel>,
    ) -> Result<Self, ConfigError> {
        let units = build_units(config, sources)?;
        Ok(Self::new(units, PipelineConfig::from_robot(config)?, channel))
    }

    pub async fn run_cycle(&mut self) -> CycleReport {
        let jobs = self.slots.iter_mut().map(|slot| {
            let unit = slot.unit.take();
            let config = Arc::clone(&self.shared_config);
            async move {
                let Some(mut unit) = unit else {
                    return None;
                };
                let joined = tokio::task::spawn_blocking(move || {
                    let outcome = evaluate_unit(&mut unit, &config);
                    (unit, outcome)
                })
                .await;
                match joined {
                    Ok(done) => Some(done),
                    Err(e) => {
                        error!(error = %e, "camera worker failed");
                        None
                    }
                }
            }
        });
        let results: Vec<Option<(CameraDecisionUnit, UnitOutcome)>> =
            stream::iter(jobs).buffered(self.max_in_flight).collect().await;

        let mut outcomes = Vec::with_capacity(results.len());
        for (slot, result) in self.slots.iter_mut().zip(results) {
            match result {
                Some((unit, outcome)) => {
                    slot.unit = Some(unit);
                    outcomes.push(outcome);
                }
                None => {
                    warn!(camera = %slot.name, "camera unavailable, degraded to no-op");
                    outcomes.push(UnitOutcome::degraded(&self.core.config));
                }
            }
        }

        self.core.finish(outcomes)
    }

    pub fn state(&self) -> &crate::arbiter::ArbiterState {
        self.core.state()
    }

    pub fn cycles(&self) -> u64 {
        self.core.cycles()
    }

    /// The mode of the most recent cycle, without running one.
    pub fn last_report(&self) -> Option<crate::arbiter::Report> {
        self.core.last_report()
    }

    /// Names of the cameras whose workers are still alive, in order.
    pub fn live_cameras(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|slot| slot.unit.is_some())
            .map(|slot| slot.name.as_str())
            .collect()
    }
}
