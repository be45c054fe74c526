use log::debug;
use std::collections::VecDeque;

use super::VideoDecoderBackend;
use crate::capture::{Frame, FramePool};
use crate::encoder::{ChunkHeader, HEADER_LEN, decompress, xor_into};
use crate::error::{Error, Result};
use crate::pipeline::types::{ChunkKind, EncodedChunk};

/// Inverse of [`DeltaEncoder`](crate::encoder::DeltaEncoder).
pub struct DeltaDecoder {
    pool: FramePool,
    reference: Option<(u32, u32, Vec<u8>)>,
    queue: VecDeque<Frame>,
}

impl DeltaDecoder {
    pub fn new(pool: FramePool) -> Self {
        Self {
            pool,
            reference: None,
            queue: VecDeque::new(),
        }
    }
}

impl VideoDecoderBackend for DeltaDecoder {
    fn push(&mut self, chunk: &EncodedChunk) -> Result<()> {
        let header = ChunkHeader::parse(&chunk.data)?;
        let expected = Frame::buffer_len(header.width, header.height);
        let mut pixels = decompress(&chunk.data[HEADER_LEN..], expected)?;
        if pixels.len() != expected {
            return Err(Error::Codec(format!(
                "chunk {} decoded to {} bytes, expected {}",
                chunk.sequence,
                pixels.len(),
                expected
            )));
        }

        if header.kind == ChunkKind::Delta {
            match &self.reference {
                Some((w, h, reference)) if (*w, *h) == (header.width, header.height) => {
                    xor_into(&mut pixels, reference);
                }
                _ => {
                    return Err(Error::Codec(format!(
                        "delta chunk {} without a reference keyframe",
                        chunk.sequence
                    )));
                }
            }
        }

        let frame = self
            .pool
            .take(header.width, header.height, chunk.timestamp, |dst| {
                dst.copy_from_slice(&pixels)
            });
        debug!("DeltaDecoder: decoded {} chunk {}", header.kind, chunk.sequence);
        self.reference = Some((header.width, header.height, pixels));
        self.queue.push_back(frame);
        Ok(())
    }

    fn take(&mut self) -> Result<Option<Frame>> {
        Ok(self.queue.pop_front())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
