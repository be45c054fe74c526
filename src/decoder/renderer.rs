use log::{debug, info};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::VideoDecoderBackend;
use crate::capture::{Frame, FramePool};
use crate::codec::{Codec, CodecFactory};
use crate::display::DisplaySink;
use crate::error::{Error, Result};
use crate::pipeline::health::PipelineHealth;
use crate::pipeline::types::EncodedChunk;

/// Time between two rendered frames during replay.
pub const DEFAULT_RENDER_INTERVAL: Duration = Duration::from_millis(500);

/// Decodes a finished chunk sequence and replays it to a sink at a fixed
/// pace.
pub struct DecoderRenderer {
    codecs: Arc<dyn CodecFactory>,
    health: Arc<PipelineHealth>,
    interval: Duration,
    backend: Option<Box<dyn VideoDecoderBackend>>,
    pool: Option<FramePool>,
    /// Decoded frames not yet drawn
    pending: VecDeque<Frame>,
}

impl DecoderRenderer {
    pub fn new(codecs: Arc<dyn CodecFactory>, health: Arc<PipelineHealth>, interval: Duration) -> Self {
        Self {
            codecs,
            health,
            interval,
            backend: None,
            pool: None,
            pending: VecDeque::new(),
        }
    }

    pub fn initialize(&mut self, codec: Codec, width: u32, height: u32) -> Result<()> {
        self.dispose();
        let pool = FramePool::new(width, height);
        self.backend = Some(self.codecs.open_decoder(codec, width, height, pool.clone())?);
        self.pool = Some(pool);
        info!("DecoderRenderer: {} decoder at {}x{}", codec, width, height);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    /// Pool backing decoded frames of the current session.
    pub fn pool(&self) -> Option<FramePool> {
        self.pool.clone()
    }

    /// Decode every chunk, then draw the frames one per interval.
    ///
    /// Returns the number of frames drawn.
    pub async fn decode_and_render(
        &mut self,
        chunks: &[EncodedChunk],
        sink: &mut dyn DisplaySink,
    ) -> Result<usize> {
        if chunks.is_empty() {
            return Err(Error::NoChunks);
        }
        let backend = self
            .backend
            .as_mut()
            .ok_or(Error::NotInitialized("decoder"))?;

        for chunk in chunks {
            backend.push(chunk)?;
            while let Some(frame) = backend.take()? {
                self.health.record_decoded();
                self.pending.push_back(frame);
            }
        }
        backend.flush()?;
        while let Some(frame) = backend.take()? {
            self.health.record_decoded();
            self.pending.push_back(frame);
        }
        info!(
            "DecoderRenderer: decoded {} frames from {} chunks",
            self.pending.len(),
            chunks.len()
        );

        let Some((width, height)) = self.pending.front().map(Frame::dimensions) else {
            return Ok(0);
        };
        sink.configure(width, height).await?;

        let mut rendered = 0;
        let mut last: Option<Instant> = None;
        while let Some(frame) = self.pending.pop_front() {
            if let Some(last) = last {
                tokio::time::sleep_until(last + self.interval).await;
            }
            sink.draw_frame(&frame).await?;
            last = Some(Instant::now());
            drop(frame);

            rendered += 1;
            self.health.record_rendered();
            debug!("DecoderRenderer: rendered frame {}", rendered);
        }
        Ok(rendered)
    }

    /// Release undrawn frames and close the decoder. Idempotent.
    pub fn dispose(&mut self) {
        if !self.pending.is_empty() {
            debug!("DecoderRenderer: releasing {} undrawn frames", self.pending.len());
            self.pending.clear();
        }
        if self.backend.take().is_some() {
            info!("DecoderRenderer: decoder closed");
        }
        self.pool = None;
    }
}

impl Drop for DecoderRenderer {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{BuiltinCodecs, EncoderConfig};
    use crate::display::MemorySink;
    use crate::encoder::EncoderAdapter;
    use crate::pipeline::types::Timestamp;
    use async_trait::async_trait;

    fn renderer() -> DecoderRenderer {
        DecoderRenderer::new(
            Arc::new(BuiltinCodecs),
            Arc::new(PipelineHealth::new()),
            DEFAULT_RENDER_INTERVAL,
        )
    }

    fn encode(colors: &[[u8; 3]]) -> Vec<EncodedChunk> {
        let mut encoder = EncoderAdapter::new(Arc::new(BuiltinCodecs), Arc::new(PipelineHealth::new()));
        encoder
            .initialize(EncoderConfig {
                codec: Codec::Delta,
                width: 4,
                height: 4,
                bitrate: 1_000_000,
                framerate: 30,
            })
            .unwrap();
        for (i, rgb) in colors.iter().enumerate() {
            encoder
                .encode_frame(Frame::solid(4, 4, *rgb, Timestamp::from_micros(i as i64)), false)
                .unwrap();
        }
        encoder.flush().unwrap();
        encoder.take_chunks()
    }

    #[tokio::test]
    async fn test_rejects_empty_and_uninitialized() {
        let mut r = renderer();
        let mut sink = MemorySink::new();
        assert!(matches!(
            r.decode_and_render(&[], &mut sink).await,
            Err(Error::NoChunks)
        ));
        let chunks = encode(&[[0, 0, 0]]);
        assert!(matches!(
            r.decode_and_render(&chunks, &mut sink).await,
            Err(Error::NotInitialized(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_renders_in_order_with_pacing() {
        let colors = [[0, 0, 0], [255, 255, 255], [0, 0, 0], [255, 255, 255]];
        let chunks = encode(&colors);

        let mut r = renderer();
        r.initialize(Codec::Delta, 4, 4).unwrap();
        let pool = r.pool().unwrap();
        let mut sink = MemorySink::new();

        let rendered = r.decode_and_render(&chunks, &mut sink).await.unwrap();
        assert_eq!(rendered, 4);
        assert_eq!(sink.configured(), Some((4, 4)));
        assert_eq!(sink.colors(), colors.to_vec());
        for pair in sink.frames().windows(2) {
            assert!(pair[1].presented_at - pair[0].presented_at >= DEFAULT_RENDER_INTERVAL);
        }
        assert_eq!(pool.outstanding(), 0);
    }

    struct FailingSink;

    #[async_trait]
    impl DisplaySink for FailingSink {
        async fn configure(&mut self, _: u32, _: u32) -> Result<()> {
            Ok(())
        }
        async fn draw_frame(&mut self, _: &Frame) -> Result<()> {
            Err(Error::Sink("surface lost".into()))
        }
    }

    #[tokio::test]
    async fn test_dispose_releases_undrawn_frames() {
        let chunks = encode(&[[1, 1, 1], [2, 2, 2], [3, 3, 3]]);
        let mut r = renderer();
        r.initialize(Codec::Delta, 4, 4).unwrap();
        let pool = r.pool().unwrap();

        let err = r.decode_and_render(&chunks, &mut FailingSink).await.unwrap_err();
        assert!(matches!(err, Error::Sink(_)));
        assert_eq!(pool.outstanding(), 2);

        r.dispose();
        r.dispose();
        assert_eq!(pool.outstanding(), 0);
        assert!(!r.is_initialized());
    }
}
