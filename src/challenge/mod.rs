//! Challenge patterns and the sequencer that plays them

pub mod indicator;
pub mod pattern;
pub mod sequencer;

pub use indicator::{IndicatorController, IndicatorSignal, LoopbackIndicator};
pub use pattern::{ChallengePattern, DEFAULT_PATTERN_LENGTH, FlashState};
pub use sequencer::{CapturePoint, ChallengeSequencer, DEFAULT_SETTLE_DELAY};
