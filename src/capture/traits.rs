//! Traits for live media sources

use crate::capture::Frame;
use crate::error::Result;
use async_trait::async_trait;

/// Geometry and rate a source reports once acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl SourceSettings {
    pub fn new(width: u32, height: u32, frame_rate: u32) -> Self {
        Self {
            width,
            height,
            frame_rate,
        }
    }

    /// Nominal time between two frames.
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_micros(1_000_000 / self.frame_rate.max(1) as u64)
    }
}

/// A live, continuously-produced sequence of video frames.
///
/// Implementations own the underlying device handle. `stop` releases it and
/// must be safe to call more than once.
#[async_trait]
pub trait MediaSource: Send {
    /// Settings of the acquired stream
    fn settings(&self) -> SourceSettings;

    /// Wait for the next frame. `Ok(None)` signals end of source.
    async fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Stop producing frames and release the device
    async fn stop(&mut self) -> Result<()>;
}

/// Hands out a freshly acquired source for every run.
///
/// Device selection and permission handling live behind this seam.
#[async_trait]
pub trait MediaSourceProvider: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn MediaSource>>;
}
