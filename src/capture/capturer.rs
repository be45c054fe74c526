use log::debug;
use std::sync::Arc;

use crate::capture::Frame;
use crate::capture::slot::FrameSlot;
use crate::error::Result;
use crate::pipeline::clock::MediaClock;
use crate::pipeline::health::PipelineHealth;

/// Produces independently-owned copies of the latest source frame.
///
/// Safe to call while the background consumer keeps replacing the slot: the
/// copy is taken under the slot lock, and the producer's replace step waits
/// for it. Each copy is re-stamped with the run clock so capture timestamps
/// strictly increase even when the source repeats a frame.
pub struct FrameCaptureService {
    slot: Arc<FrameSlot>,
    clock: MediaClock,
    health: Arc<PipelineHealth>,
}

impl FrameCaptureService {
    pub fn new(slot: Arc<FrameSlot>, clock: MediaClock, health: Arc<PipelineHealth>) -> Self {
        Self {
            slot,
            clock,
            health,
        }
    }

    /// Snapshot the current frame. Fails with `NoFrameAvailable` before the
    /// first frame. The caller owns (and releases) the returned frame.
    pub async fn capture_frame(&self) -> Result<Frame> {
        let frame = self.slot.take_clone().await?;
        let source_ts = frame.timestamp();
        let frame = frame.with_timestamp(self.clock.next_capture_timestamp());
        self.health.record_capture();
        debug!(
            "FrameCaptureService: captured source frame {} as {}",
            source_ts,
            frame.timestamp()
        );
        Ok(frame)
    }
}
