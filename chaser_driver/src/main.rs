mod camera;

use anyhow::{Context, Result};
use camera::OpenCvCamera;
use chaser_vision::core_modules::utils::image_helper::image_helper;
use chaser_vision::{
    ChasePipeline, CommandChannel, CycleReport, FrameSource, LogChannel, ParallelChasePipeline,
    RobotConfig, SerialChannel,
};
use clap::Parser;
use opencv::highgui;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chaser")]
#[command(about = "Drives a color-chasing robot from one or more cameras", long_about = None)]
#[command(version)]
struct Cli {
    /// Robot configuration file
    #[arg(long, short, default_value = "robot.toml")]
    config: PathBuf,

    /// Log commands instead of opening the serial link
    #[arg(long)]
    dry_run: bool,

    /// Stop after this many cycles
    #[arg(long)]
    cycles: Option<u64>,

    /// Write every mask as a PNG into this directory
    #[arg(long)]
    dump_masks: Option<PathBuf>,

    /// Do not open display windows (stop with Ctrl-C)
    #[arg(long)]
    headless: bool,

    /// Only show the raw camera feeds, for aiming the cameras
    #[arg(long)]
    preview: bool,
}

enum Pipeline {
    Sequential(ChasePipeline),
    Parallel(ParallelChasePipeline),
}

impl Pipeline {
    async fn run_cycle(&mut self) -> CycleReport {
        match self {
            Pipeline::Sequential(pipeline) => tokio::task::block_in_place(|| pipeline.run_cycle()),
            Pipeline::Parallel(pipeline) => pipeline.run_cycle().await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Argument Parsing & Setup ---
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chaser_driver=info,chaser_vision=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = RobotConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    // --- 2. Camera Initialization ---
    let mut cameras = Vec::with_capacity(config.cameras.len());
    for camera in &config.cameras {
        let opened = OpenCvCamera::open(&camera.name, camera.device, camera.width, camera.height)
            .with_context(|| format!("opening camera '{}'", camera.name))?;
        info!(camera = %camera.name, role = %camera.role, device = camera.device, "camera open");
        cameras.push(opened);
    }

    if cli.preview {
        return preview(cameras);
    }

    // --- 3. Pipeline Initialization ---
    let channel: Box<dyn CommandChannel> = if cli.dry_run {
        Box::new(LogChannel::new())
    } else {
        Box::new(SerialChannel::open(&config.serial).context("opening serial link")?)
    };
    let sources: Vec<Box<dyn FrameSource>> = cameras
        .into_iter()
        .map(|camera| Box::new(camera) as Box<dyn FrameSource>)
        .collect();
    let mut pipeline = if config.parallel {
        Pipeline::Parallel(ParallelChasePipeline::from_config(&config, sources, channel)?)
    } else {
        Pipeline::Sequential(ChasePipeline::from_config(&config, sources, channel)?)
    };

    if let Some(dir) = &cli.dump_masks {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let stop = Arc::new(AtomicBool::new(false));
    let ctrl_c = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.store(true, Ordering::SeqCst);
        }
    });

    // --- 4. Main Control Loop ---
    info!(
        cameras = config.cameras.len(),
        parallel = config.parallel,
        dry_run = cli.dry_run,
        "running"
    );
    let mut cycle = 0u64;
    while !stop.load(Ordering::SeqCst) && cli.cycles.is_none_or(|limit| cycle < limit) {
        let report = pipeline.run_cycle().await;

        // --- 5. Diagnostics ---
        if let Some(dir) = &cli.dump_masks {
            for labeled in &report.masks {
                let path = image_helper::mask_file_name(dir, cycle, &labeled.label);
                if let Err(e) = image_helper::save_mask(&path, &labeled.mask) {
                    warn!(path = %path.display(), error = %e, "mask not saved");
                }
            }
        }
        if !cli.headless {
            for labeled in &report.masks {
                if let Err(e) = camera::show_mask(&labeled.label, &labeled.mask) {
                    warn!(window = %labeled.label, error = %e, "mask not shown");
                }
            }
            if quit_requested() {
                break;
            }
        }
        cycle += 1;
    }

    info!(cycles = cycle, "stopped");
    if !cli.headless {
        close_windows();
    }
    Ok(())
}

/// A display failure never stops the robot; it is logged and the loop goes on.
fn quit_requested() -> bool {
    camera::quit_requested().unwrap_or_else(|e| {
        warn!(error = %e, "display event loop failed");
        false
    })
}

fn close_windows() {
    if let Err(e) = highgui::destroy_all_windows() {
        warn!(error = %e, "windows not closed");
    }
}

/// Shows every camera's raw feed until `q` is pressed.
fn preview(mut cameras: Vec<OpenCvCamera>) -> Result<()> {
    info!("preview mode, press q in a window to quit");
    loop {
        for camera in cameras.iter_mut() {
            let name = camera.name().to_string();
            match camera.read_raw() {
                Ok(frame) => {
                    if let Err(e) = highgui::imshow(&name, frame) {
                        warn!(camera = %name, error = %e, "frame not shown");
                    }
                }
                Err(e) => warn!(camera = %name, error = %e, "no frame"),
            }
        }
        if quit_requested() {
            break;
        }
    }
    close_windows();
    Ok(())
}
