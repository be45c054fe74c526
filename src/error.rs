//! Error types for the liveness pipeline.
//!
//! Every component returns [`Result`]; the coordinator surfaces the first
//! unrecovered error of a run only after cleanup has completed.

use std::time::Duration;
use thiserror::Error;

/// Failures that can abort (or, for classifier errors, degrade) a run.
#[derive(Debug, Error)]
pub enum Error {
    /// The media source never produced a frame within the bound.
    #[error("no frame observed from the media source within {0:?}")]
    SourceTimeout(Duration),

    /// A capture was requested before any frame had been observed.
    #[error("no frame available to capture")]
    NoFrameAvailable,

    /// Operation on a component that was never initialized or already disposed.
    #[error("{0} used before initialization or after disposal")]
    NotInitialized(&'static str),

    /// The codec runtime rejected the requested configuration.
    #[error("unsupported codec configuration: {0}")]
    UnsupportedCodec(String),

    /// The capture phase produced zero chunks.
    #[error("capture produced no encoded data")]
    NoEncodedData,

    /// Decode requested with an empty chunk sequence.
    #[error("no chunks to decode")]
    NoChunks,

    /// Classifier timed out or answered with something unusable.
    #[error("classifier failure: {0}")]
    ClassifierFailure(String),

    /// Best-effort cleanup step failed. Logged, never returned over a prior error.
    #[error("cleanup failed: {0}")]
    CleanupError(String),

    #[error("media source error: {0}")]
    Source(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("display sink error: {0}")]
    Sink(String),

    #[error("invalid challenge pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// True for failures reported by the classifier collaborator.
    pub fn is_classifier_failure(&self) -> bool {
        matches!(self, Error::ClassifierFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = Error::SourceTimeout(Duration::from_secs(5));
        assert_eq!(
            err.to_string(),
            "no frame observed from the media source within 5s"
        );
        assert_eq!(
            Error::NotInitialized("encoder").to_string(),
            "encoder used before initialization or after disposal"
        );
    }

    #[test]
    fn test_classifier_failure_flag() {
        assert!(Error::ClassifierFailure("timeout".into()).is_classifier_failure());
        assert!(!Error::NoChunks.is_classifier_failure());
    }
}
