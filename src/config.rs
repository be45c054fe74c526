use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::challenge::{ChallengePattern, DEFAULT_PATTERN_LENGTH};
use crate::codec::Codec;
use crate::error::{Error, Result};

/// Settings for one liveness run.
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Steps in a random pattern
    pub pattern_length: usize,
    /// Fixed `"BWBW"` pattern instead of a random one
    pub pattern: Option<String>,
    pub total_duration_ms: u64,
    pub settle_delay_ms: u64,
    /// Keep every Nth capture for validation; 0 disables sampling
    pub sample_every: usize,
    pub first_frame_timeout_ms: u64,
    pub classifier_timeout_ms: u64,
    pub render_interval_ms: u64,
    pub codec: Codec,
    pub bitrate: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            pattern_length: DEFAULT_PATTERN_LENGTH,
            pattern: None,
            total_duration_ms: 10_000,
            settle_delay_ms: 50,
            sample_every: 5,
            first_frame_timeout_ms: 5_000,
            classifier_timeout_ms: 10_000,
            render_interval_ms: 500,
            codec: Codec::Delta,
            bitrate: 1_000_000,
        }
    }
}

impl RunConfig {
    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn total_duration(&self) -> Duration {
        Duration::from_millis(self.total_duration_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn first_frame_timeout(&self) -> Duration {
        Duration::from_millis(self.first_frame_timeout_ms)
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_millis(self.classifier_timeout_ms)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    /// The configured pattern, or a fresh random one.
    pub fn challenge_pattern(&self) -> Result<ChallengePattern> {
        match &self.pattern {
            Some(pattern) => ChallengePattern::parse(pattern, self.total_duration()),
            None => ChallengePattern::random(
                self.pattern_length,
                self.total_duration(),
                &mut rand::thread_rng(),
            ),
        }
    }
}

/// Returns a version as specified in Cargo.toml
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}
