//! Frame Capture Layer
//!
//! Hands camera frames to the detectors. A producer publishes into a
//! single-slot [`FrameSlot`]; a [`DetectionWorker`] consumes the newest frame.
//! Frames can also be replayed from a directory of still images.

pub mod frame;
pub mod slot;
pub mod worker;

pub use frame::CapturedFrame;
pub use slot::{FrameSlot, StopToken};
pub use worker::{DetectionWorker, WorkerOutput};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Still images replayed as a frame sequence
#[derive(Debug, Clone)]
pub struct ImageDirSource {
    paths: Vec<PathBuf>,
}

impl ImageDirSource {
    /// Collect the images in `dir`, sorted by file name
    pub fn open(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read image directory {:?}", dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image_file(path))
            .collect();
        paths.sort();

        info!("Found {} images in {:?}", paths.len(), dir);
        Ok(Self { paths })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Start a producer thread publishing one image every `interval`
    ///
    /// Unreadable images are skipped. The thread ends when the images run out
    /// or `stop` is set, and returns the number of frames published.
    pub fn spawn_replay(
        self,
        slot: Arc<FrameSlot>,
        stop: StopToken,
        interval: Duration,
    ) -> JoinHandle<u64> {
        std::thread::spawn(move || {
            let mut sequence = 0u64;
            for path in &self.paths {
                if stop.is_stopped() {
                    break;
                }

                match load_frame(path, sequence + 1) {
                    Ok(frame) => {
                        sequence += 1;
                        debug!("Publishing frame #{} from {:?}", sequence, path);
                        slot.publish(frame);
                    }
                    Err(e) => {
                        warn!("Skipping {:?}: {:#}", path, e);
                        continue;
                    }
                }

                std::thread::sleep(interval);
            }
            info!("Replay finished after {} frames", sequence);
            sequence
        })
    }
}

/// Load an image file as a frame
pub fn load_frame(path: &Path, sequence: u64) -> Result<CapturedFrame> {
    let image = image::open(path)
        .with_context(|| format!("Failed to open image {:?}", path))?
        .to_rgb8();
    Ok(CapturedFrame::new(image, sequence))
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
