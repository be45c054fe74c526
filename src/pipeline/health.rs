//! Health metrics for a liveness run

use std::sync::atomic::{AtomicU64, Ordering};

/// Health metrics for a pipeline run
///
/// Tracks counters for every stage so a run can be summarized in a single
/// log line. All fields use atomic operations; the background frame consumer
/// updates them concurrently with the workflow.
#[derive(Debug, Default)]
pub struct PipelineHealth {
    /// Frames delivered by the media source into the frame slot
    pub frames_received: AtomicU64,

    /// Frames cloned out of the slot at capture points
    pub frames_captured: AtomicU64,

    /// Chunks collected from the encoder
    pub chunks_encoded: AtomicU64,

    /// Total bytes of encoded data
    pub bytes_encoded: AtomicU64,

    /// Number of key chunks collected
    pub keyframes_encoded: AtomicU64,

    /// Frames produced by the decoder
    pub frames_decoded: AtomicU64,

    /// Frames drawn to the display sink
    pub frames_rendered: AtomicU64,

    /// Classifier calls that failed or timed out
    pub classifier_failures: AtomicU64,
}

impl PipelineHealth {
    /// Create a new health metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_capture(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a collected encoder chunk
    pub fn record_chunk(&self, size: usize, is_keyframe: bool) {
        self.chunks_encoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_encoded.fetch_add(size as u64, Ordering::Relaxed);
        if is_keyframe {
            self.keyframes_encoded.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_decoded(&self) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rendered(&self) {
        self.frames_rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_classifier_failure(&self) {
        self.classifier_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Reset all counters at the start of a run
    pub fn reset(&self) {
        for counter in [
            &self.frames_received,
            &self.frames_captured,
            &self.chunks_encoded,
            &self.bytes_encoded,
            &self.keyframes_encoded,
            &self.frames_decoded,
            &self.frames_rendered,
            &self.classifier_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Get a summary of health metrics
    pub fn summary(&self) -> HealthSummary {
        HealthSummary {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            chunks_encoded: self.chunks_encoded.load(Ordering::Relaxed),
            bytes_encoded: self.bytes_encoded.load(Ordering::Relaxed),
            keyframes_encoded: self.keyframes_encoded.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            classifier_failures: self.classifier_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of health metrics
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HealthSummary {
    pub frames_received: u64,
    pub frames_captured: u64,
    pub chunks_encoded: u64,
    pub bytes_encoded: u64,
    pub keyframes_encoded: u64,
    pub frames_decoded: u64,
    pub frames_rendered: u64,
    pub classifier_failures: u64,
}

impl std::fmt::Display for HealthSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Health: {} frames in, {} captured, {} chunks ({} key, {} bytes), {} decoded, {} rendered, {} classifier failures",
            self.frames_received,
            self.frames_captured,
            self.chunks_encoded,
            self.keyframes_encoded,
            self.bytes_encoded,
            self.frames_decoded,
            self.frames_rendered,
            self.classifier_failures
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_metrics() {
        let health = PipelineHealth::new();

        health.record_chunk(1000, true);
        health.record_chunk(2000, false);
        health.record_chunk(1500, false);
        health.record_capture();
        health.record_rendered();

        let summary = health.summary();
        assert_eq!(summary.chunks_encoded, 3);
        assert_eq!(summary.bytes_encoded, 4500);
        assert_eq!(summary.keyframes_encoded, 1);
        assert_eq!(summary.frames_captured, 1);
        assert_eq!(summary.frames_rendered, 1);
    }

    #[test]
    fn test_reset() {
        let health = PipelineHealth::new();
        health.record_frame_received();
        health.record_classifier_failure();
        health.reset();
        assert_eq!(health.summary(), PipelineHealth::new().summary());
    }
}
