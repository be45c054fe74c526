use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::frame::Frame;
use crate::pipeline::types::Timestamp;

/// Initial number of buffers to pre-allocate in the pool
const INITIAL_POOL_SIZE: usize = 4;

/// Pool of RGBA pixel buffers shared by every frame it hands out.
///
/// A frame allocated from the pool returns its buffer when it is dropped, and
/// the pool keeps count of frames still alive so a run can assert that it
/// released everything it acquired.
#[derive(Clone)]
pub struct FramePool {
    inner: Arc<Mutex<PoolInner>>,
}

struct PoolInner {
    buffers: VecDeque<Vec<u8>>,
    outstanding: usize,
    w: u32,
    h: u32,
}

impl FramePool {
    pub fn new(w: u32, h: u32) -> Self {
        let len = Frame::buffer_len(w, h);
        let mut buffers = VecDeque::with_capacity(INITIAL_POOL_SIZE);

        // Pre-allocate initial buffers to avoid runtime allocation
        for _ in 0..INITIAL_POOL_SIZE {
            buffers.push_back(vec![0u8; len]);
        }

        Self {
            inner: Arc::new(Mutex::new(PoolInner {
                buffers,
                outstanding: 0,
                w,
                h,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a writable frame from the pool and let `fill` write its pixels.
    ///
    /// Frames whose size differs from the pool geometry are allocated fresh
    /// but are still tracked as outstanding.
    pub fn take<F>(&self, w: u32, h: u32, timestamp: Timestamp, fill: F) -> Frame
    where
        F: FnOnce(&mut [u8]),
    {
        let len = Frame::buffer_len(w, h);
        let mut data = {
            let mut inner = self.lock();
            inner.outstanding += 1;
            if inner.w == w && inner.h == h {
                inner.buffers.pop_front().unwrap_or_default()
            } else {
                Vec::new()
            }
        };
        data.resize(len, 0);
        fill(&mut data);
        Frame::pooled(w, h, timestamp, data, self.clone())
    }

    /// Allocate a frame filled with a single RGB color.
    pub fn solid(&self, w: u32, h: u32, rgb: [u8; 3], timestamp: Timestamp) -> Frame {
        self.take(w, h, timestamp, |data| {
            for px in data.chunks_exact_mut(4) {
                px.copy_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
            }
        })
    }

    /// Put a released frame buffer back to the pool.
    pub(crate) fn put(&self, buffer: Vec<u8>) {
        let mut inner = self.lock();
        inner.outstanding = inner.outstanding.saturating_sub(1);
        // Only keep buffers if pool isn't too large (prevent unbounded growth)
        let len = Frame::buffer_len(inner.w, inner.h);
        if buffer.len() == len && inner.buffers.len() < INITIAL_POOL_SIZE * 2 {
            inner.buffers.push_back(buffer);
        }
    }

    /// Number of frames handed out and not yet released.
    pub fn outstanding(&self) -> usize {
        self.lock().outstanding
    }

    /// Number of idle buffers ready for reuse.
    pub fn idle(&self) -> usize {
        self.lock().buffers.len()
    }
}

impl std::fmt::Debug for FramePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("FramePool")
            .field("size", &(inner.w, inner.h))
            .field("outstanding", &inner.outstanding)
            .field("idle", &inner.buffers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outstanding_tracks_release() {
        let pool = FramePool::new(4, 2);
        let a = pool.solid(4, 2, [10, 20, 30], Timestamp::from_micros(0));
        let b = a.clone();
        assert_eq!(pool.outstanding(), 2);

        drop(a);
        assert_eq!(pool.outstanding(), 1);
        drop(b);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_buffers_are_reused() {
        let pool = FramePool::new(2, 2);
        assert_eq!(pool.idle(), INITIAL_POOL_SIZE);

        let frame = pool.solid(2, 2, [1, 1, 1], Timestamp::default());
        assert_eq!(pool.idle(), INITIAL_POOL_SIZE - 1);
        drop(frame);
        assert_eq!(pool.idle(), INITIAL_POOL_SIZE);
    }

    #[test]
    fn test_foreign_size_not_pooled() {
        let pool = FramePool::new(2, 2);
        let frame = pool.solid(8, 8, [0, 0, 0], Timestamp::default());
        assert_eq!(frame.data().len(), 8 * 8 * 4);
        assert_eq!(pool.outstanding(), 1);
        drop(frame);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.idle(), INITIAL_POOL_SIZE);
    }
}
