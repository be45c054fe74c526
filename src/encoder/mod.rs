//! Video encoding module
//!
//! The [`EncoderAdapter`] drives one [`VideoEncoderBackend`] per run. The
//! software `delta` backend is always built; H.264 through FFmpeg sits behind
//! the `ffmpeg` feature.

mod adapter;
mod delta;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

use crate::capture::Frame;
use crate::error::Result;
use crate::pipeline::types::EncodedChunk;

pub use adapter::EncoderAdapter;
pub use delta::DeltaEncoder;
pub(crate) use delta::{ChunkHeader, HEADER_LEN, decompress, xor_into};

/// Codec backend with an output queue.
///
/// `push` may buffer; produced chunks are collected with `take` until it
/// returns `None`. `flush` forces out everything still buffered.
pub trait VideoEncoderBackend: Send {
    fn name(&self) -> &str;
    fn push(&mut self, frame: &Frame, keyframe: bool) -> Result<()>;
    fn take(&mut self) -> Result<Option<EncodedChunk>>;
    fn flush(&mut self) -> Result<()>;
}
