//! Frame capture module
//!
//! A [`FrameSourceAdapter`] keeps a live source drained into a single-slot
//! buffer on a background task, and a [`FrameCaptureService`] hands out
//! independent copies of whatever frame is current at a capture point.

pub mod capturer;
pub mod frame;
pub mod frame_pool;
pub mod slot;
pub mod synthetic;
mod traits;

pub use capturer::FrameCaptureService;
pub use frame::Frame;
pub use frame_pool::FramePool;
pub use slot::{FrameRef, FrameSlot, FrameSourceAdapter};
pub use synthetic::{LoopbackProvider, LoopbackSource, ScriptedSource, TestPatternSource};
pub use traits::{MediaSource, MediaSourceProvider, SourceSettings};
