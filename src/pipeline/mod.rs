//! Pipeline orchestration for a liveness run
//!
//! - `coordinator`: sequences the phases of a run and owns teardown
//! - `state`: run state machine
//! - `clock`: capture timestamps
//! - `health`: per-run counters
//! - `types`: timestamps and encoded chunks

pub mod clock;
pub mod coordinator;
pub mod health;
pub mod state;
pub mod types;

pub use clock::MediaClock;
pub use coordinator::{CaptureSession, LivenessCoordinator, RunHooks, RunReport};
pub use health::{HealthSummary, PipelineHealth};
pub use state::RunState;
pub use types::{ChunkKind, EncodedChunk, Timestamp};
