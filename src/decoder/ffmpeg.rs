use ac_ffmpeg::codec::Decoder;
use ac_ffmpeg::codec::video::VideoDecoder;
use ac_ffmpeg::packet::PacketMut;
use ac_ffmpeg::time::{TimeBase, Timestamp as FfTimestamp};

use super::VideoDecoderBackend;
use crate::capture::{Frame, FramePool};
use crate::codec::yuv::{copy_plane, i420_len, i420_to_rgba};
use crate::error::{Error, Result};
use crate::pipeline::types::{EncodedChunk, Timestamp};

fn codec_err(e: ac_ffmpeg::Error) -> Error {
    Error::Codec(e.to_string())
}

/// H.264 decoder using FFmpeg.
///
/// Output is converted to RGBA and cropped to the session size, undoing the
/// even-size padding applied by the encoder.
pub struct FfmpegDecoder {
    decoder: VideoDecoder,
    time_base: TimeBase,
    width: u32,
    height: u32,
    pool: FramePool,
    /// Reusable packed I420 buffer
    packed: Vec<u8>,
}

unsafe impl Send for FfmpegDecoder {}

impl FfmpegDecoder {
    pub fn new(width: u32, height: u32, pool: FramePool) -> Result<Self> {
        let time_base = TimeBase::new(1, 1_000_000);
        let decoder = VideoDecoder::builder("h264")
            .and_then(|b| b.time_base(time_base).build())
            .map_err(|e| Error::UnsupportedCodec(format!("h264 decoder: {}", e)))?;

        Ok(Self {
            decoder,
            time_base,
            width,
            height,
            pool,
            packed: Vec::new(),
        })
    }
}

impl VideoDecoderBackend for FfmpegDecoder {
    fn push(&mut self, chunk: &EncodedChunk) -> Result<()> {
        let packet = PacketMut::from(&chunk.data[..])
            .with_pts(FfTimestamp::new(chunk.timestamp.micros, self.time_base))
            .freeze();
        self.decoder.push(packet).map_err(codec_err)
    }

    fn take(&mut self) -> Result<Option<Frame>> {
        let Some(frame) = self.decoder.take().map_err(codec_err)? else {
            return Ok(None);
        };

        let (w, h) = (frame.width(), frame.height());
        let (cw, ch) = (w / 2, h / 2);
        self.packed.resize(i420_len(w as u32, h as u32), 0);

        let planes = frame.planes();
        let (y_len, c_len) = (w * h, cw * ch);
        let (y_dst, rest) = self.packed.split_at_mut(y_len);
        let (u_dst, v_dst) = rest.split_at_mut(c_len);
        copy_plane(planes[0].data(), planes[0].line_size(), y_dst, w, w, h);
        copy_plane(planes[1].data(), planes[1].line_size(), u_dst, cw, cw, ch);
        copy_plane(planes[2].data(), planes[2].line_size(), v_dst, cw, cw, ch);

        let (out_w, out_h) = (self.width.min(w as u32), self.height.min(h as u32));
        let mut rgba = vec![0u8; Frame::buffer_len(w as u32, h as u32)];
        i420_to_rgba(&self.packed, w as u32, h as u32, &mut rgba);

        let timestamp = Timestamp::from_micros(frame.pts().timestamp());
        let row = out_w as usize * 4;
        let full_row = w * 4;
        Ok(Some(self.pool.take(out_w, out_h, timestamp, |dst| {
            for (y, line) in dst.chunks_exact_mut(row).enumerate() {
                line.copy_from_slice(&rgba[y * full_row..y * full_row + row]);
            }
        })))
    }

    fn flush(&mut self) -> Result<()> {
        self.decoder.flush().map_err(codec_err)
    }
}
