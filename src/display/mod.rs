//! Display sinks for rendered frames

pub mod png;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::capture::Frame;
use crate::error::Result;
use crate::pipeline::types::Timestamp;

pub use png::PngSequenceSink;

/// Output surface for decoded or preview frames.
///
/// `configure` is called once before the first `draw_frame`; draws are
/// strictly sequential. The sink only borrows each frame.
#[async_trait]
pub trait DisplaySink: Send {
    async fn configure(&mut self, width: u32, height: u32) -> Result<()>;
    async fn draw_frame(&mut self, frame: &Frame) -> Result<()>;
}

/// Summary of one drawn frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedFrame {
    pub width: u32,
    pub height: u32,
    pub timestamp: Timestamp,
    pub mean_rgb: [u8; 3],
    pub presented_at: Instant,
}

/// Sink that remembers what it was asked to draw.
#[derive(Debug, Default)]
pub struct MemorySink {
    configured: Option<(u32, u32)>,
    frames: Vec<RenderedFrame>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configured(&self) -> Option<(u32, u32)> {
        self.configured
    }

    pub fn frames(&self) -> &[RenderedFrame] {
        &self.frames
    }

    /// Mean colors of the drawn frames, in draw order.
    pub fn colors(&self) -> Vec<[u8; 3]> {
        self.frames.iter().map(|f| f.mean_rgb).collect()
    }
}

#[async_trait]
impl DisplaySink for MemorySink {
    async fn configure(&mut self, width: u32, height: u32) -> Result<()> {
        self.configured = Some((width, height));
        Ok(())
    }

    async fn draw_frame(&mut self, frame: &Frame) -> Result<()> {
        self.frames.push(RenderedFrame {
            width: frame.width(),
            height: frame.height(),
            timestamp: frame.timestamp(),
            mean_rgb: frame.mean_rgb(),
            presented_at: Instant::now(),
        });
        Ok(())
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl DisplaySink for NullSink {
    async fn configure(&mut self, _width: u32, _height: u32) -> Result<()> {
        Ok(())
    }

    async fn draw_frame(&mut self, _frame: &Frame) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_records_draws() {
        let mut sink = MemorySink::new();
        sink.configure(2, 2).await.unwrap();
        sink.draw_frame(&Frame::solid(2, 2, [9, 8, 7], Timestamp::from_micros(5)))
            .await
            .unwrap();

        assert_eq!(sink.configured(), Some((2, 2)));
        assert_eq!(sink.colors(), vec![[9, 8, 7]]);
        assert_eq!(sink.frames()[0].timestamp.micros, 5);
    }
}
