//! Codec selection
//!
//! Encoder and decoder backends are opened through a [`CodecFactory`] so the
//! orchestrator never names a concrete implementation.

pub mod yuv;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::capture::FramePool;
use crate::decoder::{DeltaDecoder, VideoDecoderBackend};
use crate::encoder::{DeltaEncoder, VideoEncoderBackend};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Lossless brotli key/delta codec, always available
    #[default]
    Delta,
    /// H.264 through FFmpeg
    H264,
}

impl Codec {
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::Delta => "delta",
            Codec::H264 => "h264",
        }
    }

    /// True when this build can open the codec.
    pub fn is_available(&self) -> bool {
        match self {
            Codec::Delta => true,
            Codec::H264 => cfg!(feature = "ffmpeg"),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Codec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delta" => Ok(Codec::Delta),
            "h264" | "avc" => Ok(Codec::H264),
            other => Err(Error::UnsupportedCodec(other.to_string())),
        }
    }
}

/// Encoder session parameters, derived from the source settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    pub codec: Codec,
    pub width: u32,
    pub height: u32,
    /// Target bits per second
    pub bitrate: u64,
    pub framerate: u32,
}

impl EncoderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::UnsupportedCodec(format!(
                "{} at {}x{}",
                self.codec, self.width, self.height
            )));
        }
        if self.framerate == 0 {
            return Err(Error::UnsupportedCodec(format!("{} at 0 fps", self.codec)));
        }
        Ok(())
    }
}

/// Opens codec backends.
pub trait CodecFactory: Send + Sync {
    fn open_encoder(&self, config: &EncoderConfig) -> Result<Box<dyn VideoEncoderBackend>>;

    /// Decoded frames are allocated from `pool`.
    fn open_decoder(
        &self,
        codec: Codec,
        width: u32,
        height: u32,
        pool: FramePool,
    ) -> Result<Box<dyn VideoDecoderBackend>>;
}

/// Backends compiled into this build.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCodecs;

impl CodecFactory for BuiltinCodecs {
    fn open_encoder(&self, config: &EncoderConfig) -> Result<Box<dyn VideoEncoderBackend>> {
        config.validate()?;
        match config.codec {
            Codec::Delta => Ok(Box::new(DeltaEncoder::new(config))),
            #[cfg(feature = "ffmpeg")]
            Codec::H264 => Ok(Box::new(crate::encoder::ffmpeg::FfmpegEncoder::new(config)?)),
            #[cfg(not(feature = "ffmpeg"))]
            Codec::H264 => Err(Error::UnsupportedCodec(
                "h264 (built without the ffmpeg feature)".into(),
            )),
        }
    }

    fn open_decoder(
        &self,
        codec: Codec,
        width: u32,
        height: u32,
        pool: FramePool,
    ) -> Result<Box<dyn VideoDecoderBackend>> {
        if width == 0 || height == 0 {
            return Err(Error::UnsupportedCodec(format!(
                "{} at {}x{}",
                codec, width, height
            )));
        }
        match codec {
            Codec::Delta => Ok(Box::new(DeltaDecoder::new(pool))),
            #[cfg(feature = "ffmpeg")]
            Codec::H264 => Ok(Box::new(crate::decoder::ffmpeg::FfmpegDecoder::new(
                width, height, pool,
            )?)),
            #[cfg(not(feature = "ffmpeg"))]
            Codec::H264 => Err(Error::UnsupportedCodec(
                "h264 (built without the ffmpeg feature)".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(codec: Codec, width: u32, height: u32) -> EncoderConfig {
        EncoderConfig {
            codec,
            width,
            height,
            bitrate: 1_000_000,
            framerate: 30,
        }
    }

    #[test]
    fn test_parse_codec() {
        assert_eq!("delta".parse::<Codec>().unwrap(), Codec::Delta);
        assert_eq!("H264".parse::<Codec>().unwrap(), Codec::H264);
        assert!(matches!("vp9".parse::<Codec>(), Err(Error::UnsupportedCodec(_))));
    }

    #[test]
    fn test_zero_size_is_unsupported() {
        let err = BuiltinCodecs.open_encoder(&config(Codec::Delta, 0, 8)).err();
        assert!(matches!(err, Some(Error::UnsupportedCodec(_))));
        let err = BuiltinCodecs
            .open_decoder(Codec::Delta, 8, 0, FramePool::new(8, 0))
            .err();
        assert!(matches!(err, Some(Error::UnsupportedCodec(_))));
    }

    #[test]
    fn test_delta_always_opens() {
        assert!(Codec::Delta.is_available());
        let encoder = BuiltinCodecs.open_encoder(&config(Codec::Delta, 8, 8)).unwrap();
        assert_eq!(encoder.name(), "delta");
    }

    #[cfg(not(feature = "ffmpeg"))]
    #[test]
    fn test_h264_needs_ffmpeg() {
        assert!(!Codec::H264.is_available());
        let err = BuiltinCodecs.open_encoder(&config(Codec::H264, 8, 8)).err();
        assert!(matches!(err, Some(Error::UnsupportedCodec(_))));
    }
}
