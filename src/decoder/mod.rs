//! Video decoding module
//!
//! Decoder backends turn encoded chunks back into RGBA frames; the
//! [`DecoderRenderer`] replays them to a display sink.

mod delta;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
mod renderer;

use crate::capture::Frame;
use crate::error::Result;
use crate::pipeline::types::EncodedChunk;

pub use delta::DeltaDecoder;
pub use renderer::{DEFAULT_RENDER_INTERVAL, DecoderRenderer};

/// Codec backend with an output queue, mirroring the encoder side.
pub trait VideoDecoderBackend: Send {
    fn push(&mut self, chunk: &EncodedChunk) -> Result<()>;
    fn take(&mut self) -> Result<Option<Frame>>;
    fn flush(&mut self) -> Result<()>;
}
