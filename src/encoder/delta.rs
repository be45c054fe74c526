//! Lossless software codec.
//!
//! Chunk layout: one kind byte (`0` key, `1` delta), width and height as
//! little-endian `u32`, then a brotli stream. A key chunk compresses the RGBA
//! pixels; a delta chunk compresses their XOR against the previous frame.

use brotli::{CompressorWriter, Decompressor};
use bytes::{BufMut, BytesMut};
use log::debug;
use std::collections::VecDeque;
use std::io::{self, Read, Write};

use super::VideoEncoderBackend;
use crate::capture::Frame;
use crate::codec::EncoderConfig;
use crate::error::{Error, Result};
use crate::pipeline::types::{ChunkKind, EncodedChunk};

pub(crate) const HEADER_LEN: usize = 9;
const KIND_KEY: u8 = 0;
const KIND_DELTA: u8 = 1;

const BROTLI_BUFFER: usize = 4096;
const BROTLI_QUALITY: u32 = 5;
const BROTLI_LGWIN: u32 = 22;

pub(crate) fn compress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut compressed = Vec::new();
    {
        let mut compressor =
            CompressorWriter::new(&mut compressed, BROTLI_BUFFER, BROTLI_QUALITY, BROTLI_LGWIN);
        compressor.write_all(data)?;
    }
    Ok(compressed)
}

pub(crate) fn decompress(compressed: &[u8], expected: usize) -> io::Result<Vec<u8>> {
    let mut decompressor = Decompressor::new(compressed, BROTLI_BUFFER);
    let mut data = Vec::with_capacity(expected);
    decompressor.read_to_end(&mut data)?;
    Ok(data)
}

/// Parsed chunk header.
pub(crate) struct ChunkHeader {
    pub kind: ChunkKind,
    pub width: u32,
    pub height: u32,
}

impl ChunkHeader {
    fn write(&self, out: &mut BytesMut) {
        out.put_u8(match self.kind {
            ChunkKind::Key => KIND_KEY,
            ChunkKind::Delta => KIND_DELTA,
        });
        out.put_u32_le(self.width);
        out.put_u32_le(self.height);
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(Error::Codec(format!("truncated chunk ({} bytes)", data.len())));
        }
        let kind = match data[0] {
            KIND_KEY => ChunkKind::Key,
            KIND_DELTA => ChunkKind::Delta,
            other => return Err(Error::Codec(format!("unknown chunk kind {}", other))),
        };
        let word = |at: usize| u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        Ok(Self {
            kind,
            width: word(1),
            height: word(5),
        })
    }
}

/// XOR `b` into `a` in place.
pub(crate) fn xor_into(a: &mut [u8], b: &[u8]) {
    for (x, y) in a.iter_mut().zip(b) {
        *x ^= *y;
    }
}

pub struct DeltaEncoder {
    width: u32,
    height: u32,
    /// Frames between forced keys
    gop: u64,
    reference: Option<Vec<u8>>,
    since_key: u64,
    sequence: u64,
    queue: VecDeque<EncodedChunk>,
}

impl DeltaEncoder {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            gop: 2 * config.framerate.max(1) as u64,
            reference: None,
            since_key: 0,
            sequence: 0,
            queue: VecDeque::new(),
        }
    }
}

impl VideoEncoderBackend for DeltaEncoder {
    fn name(&self) -> &str {
        "delta"
    }

    fn push(&mut self, frame: &Frame, keyframe: bool) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(Error::Codec(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }

        let key = keyframe || self.reference.is_none() || self.since_key >= self.gop;
        let pixels = frame.data();
        let payload = match (&self.reference, key) {
            (Some(reference), false) => {
                let mut diff = pixels.to_vec();
                xor_into(&mut diff, reference);
                compress(&diff)?
            }
            _ => compress(pixels)?,
        };

        let kind = if key { ChunkKind::Key } else { ChunkKind::Delta };
        let mut out = BytesMut::with_capacity(HEADER_LEN + payload.len());
        ChunkHeader {
            kind,
            width: self.width,
            height: self.height,
        }
        .write(&mut out);
        out.extend_from_slice(&payload);

        match &mut self.reference {
            Some(reference) => reference.copy_from_slice(pixels),
            None => self.reference = Some(pixels.to_vec()),
        }
        self.since_key = if key { 1 } else { self.since_key + 1 };

        debug!(
            "DeltaEncoder: #{} {} {} bytes",
            self.sequence,
            kind,
            out.len()
        );
        self.queue.push_back(EncodedChunk::new(
            out.freeze(),
            frame.timestamp(),
            kind,
            self.sequence,
        ));
        self.sequence += 1;
        Ok(())
    }

    fn take(&mut self) -> Result<Option<EncodedChunk>> {
        Ok(self.queue.pop_front())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use crate::pipeline::types::Timestamp;

    fn encoder(framerate: u32) -> DeltaEncoder {
        DeltaEncoder::new(&EncoderConfig {
            codec: Codec::Delta,
            width: 4,
            height: 4,
            bitrate: 0,
            framerate,
        })
    }

    fn frame(rgb: [u8; 3], ts: i64) -> Frame {
        Frame::solid(4, 4, rgb, Timestamp::from_micros(ts))
    }

    #[test]
    fn test_first_chunk_is_key_then_delta() {
        let mut enc = encoder(30);
        enc.push(&frame([0, 0, 0], 0), false).unwrap();
        enc.push(&frame([255, 255, 255], 1), false).unwrap();
        enc.push(&frame([0, 0, 0], 2), true).unwrap();

        let kinds: Vec<_> = std::iter::from_fn(|| enc.take().unwrap())
            .map(|c| c.kind)
            .collect();
        assert_eq!(kinds, vec![ChunkKind::Key, ChunkKind::Delta, ChunkKind::Key]);
    }

    #[test]
    fn test_gop_forces_key() {
        let mut enc = encoder(1);
        for i in 0..5 {
            enc.push(&frame([i, i, i], i as i64), false).unwrap();
        }
        let kinds: Vec<_> = std::iter::from_fn(|| enc.take().unwrap())
            .map(|c| c.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ChunkKind::Key,
                ChunkKind::Delta,
                ChunkKind::Key,
                ChunkKind::Delta,
                ChunkKind::Key
            ]
        );
    }

    #[test]
    fn test_header_layout() {
        let mut enc = encoder(30);
        enc.push(&frame([9, 9, 9], 42), false).unwrap();
        let chunk = enc.take().unwrap().unwrap();
        let header = ChunkHeader::parse(&chunk.data).unwrap();
        assert_eq!(header.kind, ChunkKind::Key);
        assert_eq!((header.width, header.height), (4, 4));
        assert_eq!(chunk.timestamp.micros, 42);
        assert_eq!(
            decompress(&chunk.data[HEADER_LEN..], 64).unwrap(),
            frame([9, 9, 9], 0).data()
        );
    }

    #[test]
    fn test_rejects_wrong_size() {
        let mut enc = encoder(30);
        let err = enc
            .push(&Frame::solid(2, 2, [0, 0, 0], Timestamp::default()), false)
            .unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
    }
}
