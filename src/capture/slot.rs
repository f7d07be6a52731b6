//! Single-slot frame hand-off
//!
//! The producer overwrites whatever frame is waiting; the consumer always gets
//! the newest one. Frames are never queued beyond depth 1.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use super::frame::CapturedFrame;

/// Latest-frame slot shared between a producer and a consumer
#[derive(Debug, Default)]
pub struct FrameSlot {
    frame: Mutex<Option<CapturedFrame>>,
    ready: Condvar,
}

impl FrameSlot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Install a frame, replacing any unread one
    ///
    /// Never blocks. Returns true if an unread frame was dropped.
    pub fn publish(&self, frame: CapturedFrame) -> bool {
        let sequence = frame.sequence;
        let dropped = self.frame.lock().replace(frame);
        self.ready.notify_one();

        if let Some(old) = &dropped {
            trace!("Frame #{} replaced unread frame #{}", sequence, old.sequence);
        }
        dropped.is_some()
    }

    /// Take the waiting frame, if any
    pub fn take(&self) -> Option<CapturedFrame> {
        self.frame.lock().take()
    }

    /// Wait up to `timeout` for a frame
    pub fn take_timeout(&self, timeout: Duration) -> Option<CapturedFrame> {
        let mut frame = self.frame.lock();
        if frame.is_none() {
            let _ = self.ready.wait_for(&mut frame, timeout);
        }
        frame.take()
    }

    /// Whether a frame is waiting
    pub fn is_pending(&self) -> bool {
        self.frame.lock().is_some()
    }
}

/// Cooperative cancellation flag
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::thread;
    use std::time::Instant;

    fn frame(sequence: u64) -> CapturedFrame {
        CapturedFrame::new(RgbImage::new(2, 2), sequence)
    }

    #[test]
    fn test_newer_frame_replaces_unread() {
        let slot = FrameSlot::new();

        assert!(!slot.publish(frame(1)));
        assert!(slot.publish(frame(2)));

        assert_eq!(slot.take().map(|f| f.sequence), Some(2));
        assert!(slot.take().is_none());
    }

    #[test]
    fn test_take_empty_slot() {
        let slot = FrameSlot::new();
        assert!(slot.take().is_none());
        assert!(!slot.is_pending());
    }

    #[test]
    fn test_take_timeout_expires() {
        let slot = FrameSlot::new();
        let start = Instant::now();
        assert!(slot.take_timeout(Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_take_timeout_wakes_on_publish() {
        let slot = FrameSlot::new();
        let producer = {
            let slot = slot.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                slot.publish(frame(7));
            })
        };

        let received = slot.take_timeout(Duration::from_secs(5));
        producer.join().unwrap();
        assert_eq!(received.map(|f| f.sequence), Some(7));
    }

    #[test]
    fn test_consumer_never_sees_stale_frames() {
        let slot = FrameSlot::new();
        let producer = {
            let slot = slot.clone();
            thread::spawn(move || {
                for sequence in 1..=500 {
                    slot.publish(frame(sequence));
                }
            })
        };

        let mut last_seen = 0;
        while last_seen < 500 {
            if let Some(f) = slot.take_timeout(Duration::from_millis(50)) {
                assert!(f.sequence > last_seen);
                last_seen = f.sequence;
            } else if producer.is_finished() && !slot.is_pending() {
                break;
            }
        }
        producer.join().unwrap();
        assert_eq!(last_seen, 500);
    }

    #[test]
    fn test_stop_token_shared() {
        let token = StopToken::new();
        let clone = token.clone();
        assert!(!clone.is_stopped());
        token.stop();
        assert!(clone.is_stopped());
    }
}
