//! Frame validation
//!
//! A [`FrameClassifier`] scores sampled frames; the pipeline works the same
//! without one.

#[cfg(feature = "http-classifier")]
pub mod http;
pub mod labels;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::capture::Frame;
use crate::error::{Error, Result};

/// Default bound on one classifier call.
pub const DEFAULT_CLASSIFIER_TIMEOUT: Duration = Duration::from_secs(10);

/// Verdict for one sampled frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub has_face: bool,
    pub is_facing_camera: bool,
    pub wearing_glasses: bool,
    pub wearing_headwear: bool,
    /// In `[0, 1]`
    pub confidence: f32,
    /// `has_face && is_facing_camera`
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ValidationResult {
    pub fn new(
        has_face: bool,
        is_facing_camera: bool,
        wearing_glasses: bool,
        wearing_headwear: bool,
        confidence: f32,
    ) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            has_face,
            is_facing_camera,
            wearing_glasses,
            wearing_headwear,
            confidence,
            is_valid: has_face && is_facing_camera,
            reason: None,
        }
    }

    /// Invalid result standing in for a classifier that could not answer.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::new(false, false, false, false, 0.0).with_reason(reason)
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// External scene classifier.
#[async_trait]
pub trait FrameClassifier: Send + Sync {
    async fn analyze(&self, frame: &Frame) -> Result<ValidationResult>;
}

/// Run one classification bounded by `timeout`.
///
/// Timeouts surface as `ClassifierFailure`.
pub async fn classify_with_timeout(
    classifier: &dyn FrameClassifier,
    frame: &Frame,
    timeout: Duration,
) -> Result<ValidationResult> {
    match tokio::time::timeout(timeout, classifier.analyze(frame)).await {
        Ok(result) => result,
        Err(_) => Err(Error::ClassifierFailure(format!(
            "no answer within {:?}",
            timeout
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Timestamp;

    #[test]
    fn test_validity_rule() {
        assert!(ValidationResult::new(true, true, true, true, 0.9).is_valid);
        assert!(!ValidationResult::new(true, false, false, false, 0.9).is_valid);
        assert!(!ValidationResult::new(false, true, false, false, 0.9).is_valid);
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(ValidationResult::new(true, true, false, false, 1.7).confidence, 1.0);
        assert_eq!(ValidationResult::new(true, true, false, false, -2.0).confidence, 0.0);
        assert_eq!(ValidationResult::new(true, true, false, false, f32::NAN).confidence, 0.0);
    }

    #[test]
    fn test_failed_result_serializes_reason() {
        let json = serde_json::to_value(ValidationResult::failed("boom")).unwrap();
        assert_eq!(json["is_valid"], false);
        assert_eq!(json["confidence"], 0.0);
        assert_eq!(json["reason"], "boom");
    }

    struct Slow;

    #[async_trait]
    impl FrameClassifier for Slow {
        async fn analyze(&self, _frame: &Frame) -> Result<ValidationResult> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ValidationResult::new(true, true, false, false, 1.0))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_classifier_failure() {
        let frame = Frame::solid(1, 1, [0, 0, 0], Timestamp::default());
        let err = classify_with_timeout(&Slow, &frame, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_classifier_failure());
    }
}
