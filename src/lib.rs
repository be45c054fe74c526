//! Active liveness challenge.
//!
//! Flash a black/white pattern at the subject, capture one frame per step from
//! a live source, encode the frames, replay the decoded stream and optionally
//! score sampled frames with a scene classifier.

pub mod capture;
pub mod challenge;
pub mod codec;
pub mod config;
pub mod decoder;
pub mod display;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod validation;

pub use error::{Error, Result};
