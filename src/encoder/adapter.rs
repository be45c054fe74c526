use log::{debug, info, warn};
use std::sync::Arc;

use super::VideoEncoderBackend;
use crate::capture::Frame;
use crate::codec::{CodecFactory, EncoderConfig};
use crate::error::{Error, Result};
use crate::pipeline::health::PipelineHealth;
use crate::pipeline::types::EncodedChunk;

/// Streaming encoder session.
///
/// Frames go in one at a time; chunks are collected from the backend's
/// output queue after every submission and once more on [`flush`](Self::flush).
pub struct EncoderAdapter {
    codecs: Arc<dyn CodecFactory>,
    health: Arc<PipelineHealth>,
    backend: Option<Box<dyn VideoEncoderBackend>>,
    config: Option<EncoderConfig>,
    chunks: Vec<EncodedChunk>,
    submitted: u64,
}

impl EncoderAdapter {
    pub fn new(codecs: Arc<dyn CodecFactory>, health: Arc<PipelineHealth>) -> Self {
        Self {
            codecs,
            health,
            backend: None,
            config: None,
            chunks: Vec::new(),
            submitted: 0,
        }
    }

    /// Open a backend for `config`, replacing any previous session.
    pub fn initialize(&mut self, config: EncoderConfig) -> Result<()> {
        self.dispose();
        let backend = self.codecs.open_encoder(&config)?;
        info!(
            "EncoderAdapter: using {} at {}x{} @ {} fps, {} bps",
            backend.name(),
            config.width,
            config.height,
            config.framerate,
            config.bitrate
        );
        self.backend = Some(backend);
        self.config = Some(config);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    pub fn config(&self) -> Option<&EncoderConfig> {
        self.config.as_ref()
    }

    /// Submit `frame` and release it. The first frame of a session is always
    /// encoded as a keyframe.
    pub fn encode_frame(&mut self, frame: Frame, force_keyframe: bool) -> Result<()> {
        let backend = self
            .backend
            .as_mut()
            .ok_or(Error::NotInitialized("encoder"))?;

        let keyframe = force_keyframe || self.submitted == 0;
        let pushed = backend.push(&frame, keyframe);
        drop(frame);
        pushed?;
        self.submitted += 1;

        while let Some(chunk) = backend.take()? {
            Self::collect(&mut self.chunks, &self.health, chunk);
        }
        Ok(())
    }

    /// Drain the backend until every submitted frame produced its chunk.
    pub fn flush(&mut self) -> Result<()> {
        let backend = self
            .backend
            .as_mut()
            .ok_or(Error::NotInitialized("encoder"))?;

        backend.flush()?;
        while let Some(chunk) = backend.take()? {
            Self::collect(&mut self.chunks, &self.health, chunk);
        }

        if self.chunks.len() as u64 != self.submitted {
            return Err(Error::Codec(format!(
                "encoder produced {} chunks for {} frames",
                self.chunks.len(),
                self.submitted
            )));
        }
        info!(
            "EncoderAdapter: flushed {} chunks ({} keyframes)",
            self.chunks.len(),
            self.chunks.iter().filter(|c| c.is_key()).count()
        );
        Ok(())
    }

    /// Chunks collected so far, in submission order.
    pub fn chunks(&self) -> &[EncodedChunk] {
        &self.chunks
    }

    pub fn take_chunks(&mut self) -> Vec<EncodedChunk> {
        std::mem::take(&mut self.chunks)
    }

    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Close the backend and drop pending output. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(backend) = self.backend.take() {
            info!("EncoderAdapter: closing {}", backend.name());
        }
        if !self.chunks.is_empty() {
            debug!("EncoderAdapter: dropping {} pending chunks", self.chunks.len());
        }
        self.chunks.clear();
        self.config = None;
        self.submitted = 0;
    }

    fn collect(chunks: &mut Vec<EncodedChunk>, health: &PipelineHealth, chunk: EncodedChunk) {
        health.record_chunk(chunk.size(), chunk.is_key());
        match chunks.last() {
            Some(last) if last.timestamp > chunk.timestamp => {
                warn!(
                    "EncoderAdapter: chunk {} arrived out of order",
                    chunk.sequence
                );
                let at = chunks.partition_point(|c| c.timestamp <= chunk.timestamp);
                chunks.insert(at, chunk);
            }
            _ => chunks.push(chunk),
        }
    }
}

impl Drop for EncoderAdapter {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FramePool;
    use crate::codec::{BuiltinCodecs, Codec};
    use crate::decoder::VideoDecoderBackend;
    use crate::pipeline::types::{ChunkKind, Timestamp};
    use bytes::Bytes;
    use std::collections::VecDeque;

    fn config() -> EncoderConfig {
        EncoderConfig {
            codec: Codec::Delta,
            width: 4,
            height: 4,
            bitrate: 1_000_000,
            framerate: 30,
        }
    }

    fn adapter(codecs: Arc<dyn CodecFactory>) -> (EncoderAdapter, Arc<PipelineHealth>) {
        let health = Arc::new(PipelineHealth::new());
        (EncoderAdapter::new(codecs, health.clone()), health)
    }

    /// Holds every chunk until flush and releases them newest first.
    struct ReorderingBackend {
        held: Vec<EncodedChunk>,
        out: VecDeque<EncodedChunk>,
        drop_one: bool,
    }

    impl VideoEncoderBackend for ReorderingBackend {
        fn name(&self) -> &str {
            "reordering"
        }
        fn push(&mut self, frame: &Frame, keyframe: bool) -> Result<()> {
            let kind = if keyframe { ChunkKind::Key } else { ChunkKind::Delta };
            let seq = self.held.len() as u64;
            self.held
                .push(EncodedChunk::new(Bytes::from_static(b"x"), frame.timestamp(), kind, seq));
            Ok(())
        }
        fn take(&mut self) -> Result<Option<EncodedChunk>> {
            Ok(self.out.pop_front())
        }
        fn flush(&mut self) -> Result<()> {
            if self.drop_one {
                self.held.pop();
            }
            while let Some(chunk) = self.held.pop() {
                self.out.push_back(chunk);
            }
            Ok(())
        }
    }

    struct ReorderingCodecs {
        drop_one: bool,
    }

    impl CodecFactory for ReorderingCodecs {
        fn open_encoder(&self, _: &EncoderConfig) -> Result<Box<dyn VideoEncoderBackend>> {
            Ok(Box::new(ReorderingBackend {
                held: Vec::new(),
                out: VecDeque::new(),
                drop_one: self.drop_one,
            }))
        }
        fn open_decoder(
            &self,
            codec: Codec,
            width: u32,
            height: u32,
            pool: FramePool,
        ) -> Result<Box<dyn VideoDecoderBackend>> {
            BuiltinCodecs.open_decoder(codec, width, height, pool)
        }
    }

    fn frame(ts: i64) -> Frame {
        Frame::solid(4, 4, [ts as u8, 0, 0], Timestamp::from_micros(ts))
    }

    #[test]
    fn test_not_initialized() {
        let (mut enc, _) = adapter(Arc::new(BuiltinCodecs));
        assert!(matches!(
            enc.encode_frame(frame(0), false),
            Err(Error::NotInitialized(_))
        ));
        assert!(matches!(enc.flush(), Err(Error::NotInitialized(_))));

        enc.initialize(config()).unwrap();
        enc.dispose();
        enc.dispose();
        assert!(matches!(
            enc.encode_frame(frame(0), false),
            Err(Error::NotInitialized(_))
        ));
    }

    #[test]
    fn test_first_frame_is_key_and_frames_released() {
        let pool = FramePool::new(4, 4);
        let (mut enc, health) = adapter(Arc::new(BuiltinCodecs));
        enc.initialize(config()).unwrap();

        for i in 0..4 {
            let frame = pool.solid(4, 4, [i * 60, 0, 0], Timestamp::from_micros(i as i64));
            enc.encode_frame(frame, false).unwrap();
        }
        assert_eq!(pool.outstanding(), 0);

        enc.flush().unwrap();
        let chunks = enc.take_chunks();
        assert_eq!(chunks.len(), 4);
        assert!(chunks[0].is_key());
        assert!(chunks[1..].iter().all(|c| !c.is_key()));
        assert_eq!(health.summary().chunks_encoded, 4);
        assert_eq!(health.summary().keyframes_encoded, 1);
        assert!(enc.chunks().is_empty());
    }

    #[test]
    fn test_out_of_order_output_is_sorted() {
        let (mut enc, _) = adapter(Arc::new(ReorderingCodecs { drop_one: false }));
        enc.initialize(config()).unwrap();
        for ts in [10, 20, 30] {
            enc.encode_frame(frame(ts), false).unwrap();
        }
        assert!(enc.chunks().is_empty());

        enc.flush().unwrap();
        let stamps: Vec<_> = enc.chunks().iter().map(|c| c.timestamp.micros).collect();
        assert_eq!(stamps, vec![10, 20, 30]);
        assert!(enc.chunks()[0].is_key());
    }

    #[test]
    fn test_flush_detects_missing_output() {
        let (mut enc, _) = adapter(Arc::new(ReorderingCodecs { drop_one: true }));
        enc.initialize(config()).unwrap();
        enc.encode_frame(frame(1), true).unwrap();
        enc.encode_frame(frame(2), false).unwrap();
        assert!(matches!(enc.flush(), Err(Error::Codec(_))));
    }
}
