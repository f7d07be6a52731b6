//! RoverVision - floor color and license plate detection for a rover camera
//!
//! Runs the detectors on still images or replays a directory of frames through
//! the producer/worker pipeline.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::RecvTimeoutError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rover_vision::capture::{self, DetectionWorker, FrameSlot, ImageDirSource, StopToken};
use rover_vision::config::{self, AppConfig};
use rover_vision::storage;
use rover_vision::vision::{ColorRecognitionResult, ColorRecognizer, PlateDetector, PlateResult};
use rover_vision::VisionError;

/// RoverVision - floor color and license plate detection
#[derive(Parser, Debug)]
#[command(name = "rover-vision")]
#[command(about = "Floor color recognition and license plate detection for a rover camera")]
struct Args {
    /// Configuration file (defaults to config.toml in the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recognize the floor color in each image
    Color {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Look for a license plate in an image
    Plate {
        image: PathBuf,
        /// Plate to look for, e.g. "630모8800"
        #[arg(short, long)]
        target: String,
    },
    /// Replay a directory of frames through a detection worker
    Replay {
        dir: PathBuf,
        #[arg(long, value_enum)]
        task: Task,
        /// Plate to look for (plate task only)
        #[arg(short, long)]
        target: Option<String>,
    },
    /// Print the effective configuration
    Config {
        /// Also write it to the configuration file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Task {
    Color,
    Plate,
}

/// Result of one replayed frame
enum ReplayOutput {
    Color(Option<ColorRecognitionResult>),
    Plate(Result<Option<PlateResult>, VisionError>),
}

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => storage::default_config_path()?,
    };
    let config = load_or_create_config(&config_path)?;

    match args.command {
        Command::Color { images } => run_color(&config, &images),
        Command::Plate { image, target } => run_plate(&config, &image, &target),
        Command::Replay { dir, task, target } => run_replay(config, &dir, task, target),
        Command::Config { save } => {
            print!("{}", toml::to_string_pretty(&config)?);
            if save {
                config::save_config(&config, &config_path)?;
                info!("Saved configuration to {:?}", config_path);
            }
            Ok(())
        }
    }
}

/// Load configuration from file, or use defaults when there is none
fn load_or_create_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

fn run_color(config: &AppConfig, images: &[PathBuf]) -> Result<()> {
    let recognizer = ColorRecognizer::new(config.color.clone());

    for (i, path) in images.iter().enumerate() {
        let frame = capture::load_frame(path, i as u64 + 1)?;
        let result = recognizer.recognize(&frame.image, None);
        println!("{}: {}", path.display(), describe_color(result.as_ref()));
    }
    Ok(())
}

fn run_plate(config: &AppConfig, image: &Path, target: &str) -> Result<()> {
    let mut detector = PlateDetector::from_config(config)?;
    let frame = capture::load_frame(image, 1)?;

    let result = detector
        .detect(&frame.image, target)
        .with_context(|| format!("Plate detection failed for {:?}", image))?;
    println!("{}: {}", image.display(), describe_plate(result.as_ref()));
    Ok(())
}

fn run_replay(config: AppConfig, dir: &Path, task: Task, target: Option<String>) -> Result<()> {
    let source = ImageDirSource::open(dir)?;
    if source.is_empty() {
        warn!("No images found in {:?}", dir);
        return Ok(());
    }

    let slot = FrameSlot::new();
    let stop = StopToken::new();
    let poll = Duration::from_millis(config.capture.poll_interval_ms);
    let interval = Duration::from_millis(config.capture.replay_interval_ms);

    let mut worker = match task {
        Task::Color => {
            let recognizer = ColorRecognizer::new(config.color.clone());
            DetectionWorker::spawn(slot.clone(), stop.clone(), poll, move |frame| {
                ReplayOutput::Color(recognizer.recognize(&frame.image, None))
            })
        }
        Task::Plate => {
            let target = target.ok_or_else(|| anyhow!("--target is required for the plate task"))?;
            let mut detector = PlateDetector::from_config(&config)?;
            DetectionWorker::spawn(slot.clone(), stop.clone(), poll, move |frame| {
                ReplayOutput::Plate(detector.detect(&frame.image, &target))
            })
        }
    };

    info!("Replaying {} frames from {:?}", source.len(), dir);
    let mut producer = Some(source.spawn_replay(slot, stop.clone(), interval));
    let mut final_sequence: Option<u64> = None;
    let mut last_seen = 0u64;

    loop {
        if producer.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(handle) = producer.take() {
                let published = handle
                    .join()
                    .map_err(|_| anyhow!("Replay thread panicked"))?;
                final_sequence = Some(published);
            }
        }
        if final_sequence.is_some_and(|last| last_seen >= last) {
            break;
        }

        match worker.results().recv_timeout(poll.max(Duration::from_millis(50))) {
            Ok(message) => {
                last_seen = message.sequence;
                let line = match &message.output {
                    ReplayOutput::Color(result) => describe_color(result.as_ref()),
                    ReplayOutput::Plate(Ok(result)) => describe_plate(result.as_ref()),
                    ReplayOutput::Plate(Err(e)) => format!("error: {}", e),
                };
                println!("frame #{}: {}", message.sequence, line);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => bail!("Detection worker stopped unexpectedly"),
        }
    }

    stop.stop();
    worker.stop();
    Ok(())
}

fn describe_color(result: Option<&ColorRecognitionResult>) -> String {
    match result {
        Some(r) => format!("{} ({:.1}% of frame)", r.color, r.area_ratio * 100.0),
        None => "searching".to_string(),
    }
}

fn describe_plate(result: Option<&PlateResult>) -> String {
    match result {
        Some(r) => format!(
            "found {} (similarity {:.1}) at ({}, {}, {}, {})",
            r.text, r.similarity, r.bbox.x1, r.bbox.y1, r.bbox.x2, r.bbox.y2
        ),
        None => "not found".to_string(),
    }
}
