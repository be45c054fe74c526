use crate::capture::frame_pool::FramePool;
use crate::error::{Error, Result};
use crate::pipeline::types::Timestamp;

/// Bytes per RGBA8 pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// One timestamped RGBA8 image sample.
///
/// A frame has exactly one owner and is released when dropped. `Clone`
/// produces a second, independently-released owner holding a deep copy of
/// the pixels, so a clone can never observe later writes to the original
/// buffer. Frames taken from a [`FramePool`] hand their buffer back to the
/// pool on release.
pub struct Frame {
    width: u32,
    height: u32,
    timestamp: Timestamp,
    data: Vec<u8>,
    pool: Option<FramePool>,
}

impl Frame {
    /// Wrap an RGBA8 buffer. Fails if the buffer does not match the geometry.
    pub fn from_rgba(width: u32, height: u32, timestamp: Timestamp, data: Vec<u8>) -> Result<Self> {
        let expected = Self::buffer_len(width, height);
        if data.len() != expected {
            return Err(Error::Source(format!(
                "frame buffer is {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            timestamp,
            data,
            pool: None,
        })
    }

    /// An unpooled frame filled with a single color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3], timestamp: Timestamp) -> Self {
        let mut data = Vec::with_capacity(Self::buffer_len(width, height));
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
        Self {
            width,
            height,
            timestamp,
            data,
            pool: None,
        }
    }

    pub(crate) fn pooled(
        width: u32,
        height: u32,
        timestamp: Timestamp,
        data: Vec<u8>,
        pool: FramePool,
    ) -> Self {
        Self {
            width,
            height,
            timestamp,
            data,
            pool: Some(pool),
        }
    }

    #[inline]
    pub fn buffer_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * BYTES_PER_PIXEL
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Raw RGBA8 pixels, row-major, no padding.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Same pixels, new timestamp.
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Average color over all pixels.
    pub fn mean_rgb(&self) -> [u8; 3] {
        let pixels = (self.width as u64 * self.height as u64).max(1);
        let mut sum = [0u64; 3];
        for px in self.data.chunks_exact(BYTES_PER_PIXEL) {
            sum[0] += px[0] as u64;
            sum[1] += px[1] as u64;
            sum[2] += px[2] as u64;
        }
        [
            (sum[0] / pixels) as u8,
            (sum[1] / pixels) as u8,
            (sum[2] / pixels) as u8,
        ]
    }

    /// Mean luma (BT.601) in 0..=255.
    pub fn mean_luma(&self) -> u8 {
        let [r, g, b] = self.mean_rgb();
        ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
    }

    /// True when every pixel carries the same value.
    pub fn is_uniform(&self) -> bool {
        match self.data.chunks_exact(BYTES_PER_PIXEL).next() {
            Some(first) => self
                .data
                .chunks_exact(BYTES_PER_PIXEL)
                .all(|px| px == first),
            None => true,
        }
    }
}

impl Clone for Frame {
    fn clone(&self) -> Self {
        match &self.pool {
            Some(pool) => pool.take(self.width, self.height, self.timestamp, |dst| {
                dst.copy_from_slice(&self.data)
            }),
            None => Self {
                width: self.width,
                height: self.height,
                timestamp: self.timestamp,
                data: self.data.clone(),
                pool: None,
            },
        }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.put(std::mem::take(&mut self.data));
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("timestamp", &self.timestamp)
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgba_validates_length() {
        assert!(Frame::from_rgba(2, 2, Timestamp::default(), vec![0; 16]).is_ok());
        let err = Frame::from_rgba(2, 2, Timestamp::default(), vec![0; 15]).unwrap_err();
        assert!(matches!(err, Error::Source(_)));
    }

    #[test]
    fn test_clone_is_independent_copy() {
        let frame = Frame::solid(3, 3, [200, 100, 50], Timestamp::from_micros(7));
        let copy = frame.clone();
        drop(frame);
        assert_eq!(copy.mean_rgb(), [200, 100, 50]);
        assert_eq!(copy.timestamp().micros, 7);
        assert!(copy.is_uniform());
    }

    #[test]
    fn test_mean_luma() {
        assert_eq!(Frame::solid(1, 1, [0, 0, 0], Timestamp::default()).mean_luma(), 0);
        assert_eq!(
            Frame::solid(1, 1, [255, 255, 255], Timestamp::default()).mean_luma(),
            255
        );
    }

    #[test]
    fn test_with_timestamp_keeps_pool_accounting() {
        let pool = FramePool::new(2, 2);
        let frame = pool.solid(2, 2, [1, 2, 3], Timestamp::from_micros(1));
        let frame = frame.with_timestamp(Timestamp::from_micros(99));
        assert_eq!(frame.timestamp().micros, 99);
        assert_eq!(pool.outstanding(), 1);
        drop(frame);
        assert_eq!(pool.outstanding(), 0);
    }
}
