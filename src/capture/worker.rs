//! Detection worker thread
//!
//! Polls a [`FrameSlot`] for the newest frame, runs a detection task on it and
//! sends `(sequence, output)` pairs back to the owner. The results channel
//! holds a single message: an undrained result is replaced by the newer one.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, trace};

use super::frame::CapturedFrame;
use super::slot::{FrameSlot, StopToken};

/// Output of one detection cycle
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerOutput<T> {
    /// Sequence number of the processed frame
    pub sequence: u64,
    pub output: T,
}

/// Background consumer running a detection task per frame
pub struct DetectionWorker<T> {
    stop: StopToken,
    results: Receiver<WorkerOutput<T>>,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> DetectionWorker<T> {
    /// Start a worker thread
    ///
    /// The stop token is checked once per cycle; between frames the worker
    /// waits on the slot for at most `poll_interval`.
    pub fn spawn<F>(
        slot: Arc<FrameSlot>,
        stop: StopToken,
        poll_interval: Duration,
        mut task: F,
    ) -> Self
    where
        F: FnMut(&CapturedFrame) -> T + Send + 'static,
    {
        let (tx, results): (Sender<WorkerOutput<T>>, _) = bounded(1);
        let drain = results.clone();
        let thread_stop = stop.clone();

        let handle = std::thread::spawn(move || {
            info!("Detection worker starting...");
            let mut processed = 0u64;

            while !thread_stop.is_stopped() {
                let Some(frame) = slot.take_timeout(poll_interval) else {
                    continue;
                };

                let output = task(&frame);
                processed += 1;
                let message = WorkerOutput {
                    sequence: frame.sequence,
                    output,
                };
                if !publish_newest(&tx, &drain, message) {
                    debug!("Result receiver dropped, stopping worker");
                    break;
                }
            }

            info!("Detection worker exiting after {} frames", processed);
        });

        Self {
            stop,
            results,
            handle: Some(handle),
        }
    }

    /// Channel of detection results
    pub fn results(&self) -> &Receiver<WorkerOutput<T>> {
        &self.results
    }

    /// Check if the worker thread is still running
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the worker to stop and wait for it
    pub fn stop(&mut self) {
        self.stop.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Detection worker panicked");
            }
        }
    }
}

/// Send a result, discarding the one the owner has not picked up yet
fn publish_newest<T>(tx: &Sender<T>, drain: &Receiver<T>, mut message: T) -> bool {
    loop {
        match tx.try_send(message) {
            Ok(()) => return true,
            Err(TrySendError::Full(rejected)) => {
                if drain.try_recv().is_ok() {
                    trace!("Dropped stale result");
                }
                message = rejected;
            }
            Err(TrySendError::Disconnected(_)) => return false,
        }
    }
}

impl<T> Drop for DetectionWorker<T> {
    fn drop(&mut self) {
        self.stop.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
