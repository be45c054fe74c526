use ac_ffmpeg::codec::video::{self, VideoEncoder, VideoFrameMut};
use ac_ffmpeg::codec::Encoder;
use ac_ffmpeg::time::{TimeBase, Timestamp as FfTimestamp};
use bytes::Bytes;

use super::VideoEncoderBackend;
use crate::capture::Frame;
use crate::codec::EncoderConfig;
use crate::codec::yuv::{copy_plane, even, rgba_to_i420};
use crate::error::{Error, Result};
use crate::pipeline::types::{ChunkKind, EncodedChunk, Timestamp};

/// Encoder fallback chain: hardware encoders first, then libx264.
///
/// Every entry runs without B-frames so output order equals input order.
fn encoder_chain(config: &EncoderConfig) -> Vec<(&'static str, Vec<(&'static str, String)>)> {
    let bitrate = config.bitrate.to_string();
    let maxrate = (config.bitrate * 3 / 2).to_string();
    let bufsize = (config.bitrate * 2).to_string();
    let gop = (config.framerate.max(1) * 2).to_string();

    vec![
        (
            "h264_nvenc",
            vec![
                ("preset", "p2".into()),
                ("tune", "ll".into()),
                ("zerolatency", "1".into()),
                ("rc", "vbr".into()),
                ("b", bitrate.clone()),
                ("maxrate", maxrate.clone()),
                ("bufsize", bufsize.clone()),
                ("g", gop.clone()),
                ("bf", "0".into()),
                ("delay", "0".into()),
                ("forced-idr", "1".into()),
            ],
        ),
        (
            "h264_qsv",
            vec![
                ("preset", "fast".into()),
                ("g", gop.clone()),
                ("b", bitrate.clone()),
                ("maxrate", maxrate.clone()),
                ("bufsize", bufsize.clone()),
                ("bf", "0".into()),
                ("look_ahead", "0".into()),
            ],
        ),
        (
            "h264_amf",
            vec![
                ("usage", "lowlatency".into()),
                ("quality", "balanced".into()),
                ("b", bitrate.clone()),
                ("maxrate", maxrate.clone()),
                ("bufsize", bufsize.clone()),
                ("g", gop.clone()),
                ("bf", "0".into()),
            ],
        ),
        (
            "libx264",
            vec![
                ("profile", "main".into()),
                ("preset", "fast".into()),
                ("tune", "zerolatency".into()),
                ("b", bitrate),
                ("maxrate", maxrate),
                ("bufsize", bufsize),
                ("g", gop),
                ("bf", "0".into()),
                ("forced-idr", "1".into()),
            ],
        ),
    ]
}

fn codec_err(e: ac_ffmpeg::Error) -> Error {
    Error::Codec(e.to_string())
}

pub struct FfmpegEncoder {
    encoder: VideoEncoder,
    codec_name: String,
    pixel_format: video::frame::PixelFormat,
    time_base: TimeBase,
    width: u32,
    height: u32,
    sequence: u64,
}

unsafe impl Send for FfmpegEncoder {}

impl FfmpegEncoder {
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        let time_base = TimeBase::new(1, 1_000_000);
        let pixel_format = video::frame::get_pixel_format("yuv420p");
        let (w, h) = (even(config.width) as usize, even(config.height) as usize);

        let (encoder, codec_name) = Self::try_create_encoder(config, w, h, time_base, pixel_format)?;
        log::info!("Using encoder: {}", codec_name);

        Ok(Self {
            encoder,
            codec_name,
            pixel_format,
            time_base,
            width: config.width,
            height: config.height,
            sequence: 0,
        })
    }

    fn try_create_encoder(
        config: &EncoderConfig,
        w: usize,
        h: usize,
        time_base: TimeBase,
        pixel_format: video::frame::PixelFormat,
    ) -> Result<(VideoEncoder, String)> {
        for (codec, options) in encoder_chain(config) {
            let mut builder = match VideoEncoder::builder(codec) {
                Ok(b) => b,
                Err(e) => {
                    log::debug!("Encoder {} not available, skipping: {}", codec, e);
                    continue;
                }
            };
            builder = builder
                .pixel_format(pixel_format)
                .width(w)
                .height(h)
                .time_base(time_base)
                .bit_rate(config.bitrate);
            for (k, v) in &options {
                builder = builder.set_option(k, v);
            }
            match builder.build() {
                Ok(enc) => return Ok((enc, codec.to_string())),
                Err(e) => {
                    log::debug!("Encoder {} failed to initialize: {}", codec, e);
                    continue;
                }
            }
        }
        Err(Error::UnsupportedCodec(
            "no H.264 encoder available, install FFmpeg with at least libx264".into(),
        ))
    }

    fn write_planes(&self, frame: &mut VideoFrameMut, rgba: &[u8]) {
        let (w, h) = (even(self.width) as usize, even(self.height) as usize);
        let i420 = rgba_to_i420(rgba, self.width, self.height);
        let (y_len, c_len) = (w * h, (w / 2) * (h / 2));
        let sources = [
            (&i420[..y_len], w, h),
            (&i420[y_len..y_len + c_len], w / 2, h / 2),
            (&i420[y_len + c_len..], w / 2, h / 2),
        ];

        let mut planes = frame.planes_mut();
        for (index, (src, width, rows)) in sources.into_iter().enumerate() {
            let plane = &mut planes[index];
            let stride = plane.line_size();
            copy_plane(src, width, plane.data_mut(), stride, width, rows);
        }
    }
}

impl VideoEncoderBackend for FfmpegEncoder {
    fn name(&self) -> &str {
        &self.codec_name
    }

    fn push(&mut self, frame: &Frame, keyframe: bool) -> Result<()> {
        let picture_type = if keyframe {
            video::frame::PictureType::I
        } else {
            video::frame::PictureType::None
        };
        let mut out = VideoFrameMut::black(
            self.pixel_format,
            even(self.width) as usize,
            even(self.height) as usize,
        )
        .with_time_base(self.time_base);
        self.write_planes(&mut out, frame.data());

        let out = out
            .with_pts(FfTimestamp::new(frame.timestamp().micros, self.time_base))
            .with_picture_type(picture_type)
            .freeze();
        self.encoder.push(out).map_err(codec_err)
    }

    fn take(&mut self) -> Result<Option<EncodedChunk>> {
        let Some(packet) = self.encoder.take().map_err(codec_err)? else {
            return Ok(None);
        };
        let kind = if packet.is_key() {
            ChunkKind::Key
        } else {
            ChunkKind::Delta
        };
        let chunk = EncodedChunk::new(
            Bytes::copy_from_slice(packet.data()),
            Timestamp::from_micros(packet.pts().timestamp()),
            kind,
            self.sequence,
        );
        self.sequence += 1;
        Ok(Some(chunk))
    }

    fn flush(&mut self) -> Result<()> {
        self.encoder.flush().map_err(codec_err)
    }
}
