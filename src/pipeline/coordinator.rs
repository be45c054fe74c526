//! Liveness run coordinator
//!
//! Sequences acquire → encode setup → capture → decode → validate for one run
//! and always finishes with cleanup, whatever phase failed.

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::capture::{Frame, FrameCaptureService, FrameSourceAdapter, MediaSourceProvider};
use crate::challenge::{ChallengePattern, ChallengeSequencer, IndicatorController};
use crate::codec::{BuiltinCodecs, CodecFactory, EncoderConfig};
use crate::config::RunConfig;
use crate::decoder::DecoderRenderer;
use crate::display::DisplaySink;
use crate::encoder::EncoderAdapter;
use crate::error::{Error, Result};
use crate::pipeline::clock::MediaClock;
use crate::pipeline::health::{HealthSummary, PipelineHealth};
use crate::pipeline::state::RunState;
use crate::pipeline::types::ChunkKind;
use crate::validation::{FrameClassifier, ValidationResult, classify_with_timeout};

/// Progress callback: percent in `0..=100` and a short status.
pub type ProgressFn<'a> = Box<dyn FnMut(u8, &str) + Send + 'a>;

/// Called once per classified sample with its sampling index.
pub type ValidationFn<'a> = Box<dyn FnMut(usize, &ValidationResult) + Send + 'a>;

/// Optional observers of a run.
#[derive(Default)]
pub struct RunHooks<'a> {
    pub progress: Option<ProgressFn<'a>>,
    /// Receives every captured frame as it is taken
    pub preview: Option<&'a mut dyn DisplaySink>,
    pub on_validation: Option<ValidationFn<'a>>,
}

impl RunHooks<'_> {
    fn report(&mut self, percent: u8, status: &str) {
        if let Some(progress) = self.progress.as_mut() {
            progress(percent.min(100), status);
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pattern: String,
    pub chunks: usize,
    pub keyframes: usize,
    pub first_chunk: Option<ChunkKind>,
    pub frames_rendered: usize,
    pub validation: Vec<ValidationResult>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub health: HealthSummary,
}

/// Resources owned by one run.
///
/// Everything here is released by [`cleanup`](Self::cleanup), which is safe
/// to call any number of times. A session dropped without cleanup (the run
/// future was cancelled) still stops its source and hides the indicator from
/// background tasks.
pub struct CaptureSession {
    adapter: Option<FrameSourceAdapter>,
    capture: Option<FrameCaptureService>,
    encoder: EncoderAdapter,
    decoder: DecoderRenderer,
    samples: Vec<Frame>,
    indicator: Arc<dyn IndicatorController>,
    indicator_shown: bool,
}

impl CaptureSession {
    fn new(
        codecs: Arc<dyn CodecFactory>,
        health: Arc<PipelineHealth>,
        render_interval: Duration,
        indicator: Arc<dyn IndicatorController>,
    ) -> Self {
        Self {
            adapter: None,
            capture: None,
            encoder: EncoderAdapter::new(Arc::clone(&codecs), Arc::clone(&health)),
            decoder: DecoderRenderer::new(codecs, health, render_interval),
            samples: Vec::new(),
            indicator,
            indicator_shown: false,
        }
    }

    async fn show_indicator(&mut self) -> Result<()> {
        self.indicator.show().await?;
        self.indicator_shown = true;
        Ok(())
    }

    async fn hide_indicator(&mut self) -> Result<()> {
        self.indicator_shown = false;
        self.indicator.hide().await
    }

    /// Release every resource. Failures are logged, never returned.
    async fn cleanup(&mut self) {
        self.encoder.dispose();
        self.decoder.dispose();

        self.capture = None;
        if let Some(mut adapter) = self.adapter.take() {
            if let Err(e) = adapter.dispose().await {
                let e = Error::CleanupError(format!("frame source: {}", e));
                error!("LivenessCoordinator: {}", e);
            }
        }

        if !self.samples.is_empty() {
            info!("LivenessCoordinator: releasing {} unclassified samples", self.samples.len());
            self.samples.clear();
        }

        if self.indicator_shown {
            if let Err(e) = self.hide_indicator().await {
                let e = Error::CleanupError(format!("indicator: {}", e));
                error!("LivenessCoordinator: {}", e);
            }
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if !self.indicator_shown {
            return;
        }
        warn!("LivenessCoordinator: run cancelled, hiding indicator in background");
        let indicator = Arc::clone(&self.indicator);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = indicator.hide().await {
                        error!("LivenessCoordinator: {}", Error::CleanupError(format!("indicator: {}", e)));
                    }
                });
            }
            Err(_) => error!("LivenessCoordinator: no runtime left to hide the indicator"),
        }
    }
}

/// Runs liveness challenges end to end.
pub struct LivenessCoordinator {
    provider: Arc<dyn MediaSourceProvider>,
    indicator: Arc<dyn IndicatorController>,
    classifier: Option<Arc<dyn FrameClassifier>>,
    codecs: Arc<dyn CodecFactory>,
    config: RunConfig,
    state: RunState,
    results: Vec<ValidationResult>,
    health: Arc<PipelineHealth>,
}

impl LivenessCoordinator {
    pub fn new(
        provider: Arc<dyn MediaSourceProvider>,
        indicator: Box<dyn IndicatorController>,
        config: RunConfig,
    ) -> Self {
        Self {
            provider,
            indicator: Arc::from(indicator),
            classifier: None,
            codecs: Arc::new(BuiltinCodecs),
            config,
            state: RunState::Idle,
            results: Vec::new(),
            health: Arc::new(PipelineHealth::new()),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn FrameClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_codecs(mut self, codecs: Arc<dyn CodecFactory>) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Get the current run state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Get the health metrics of the current or last run
    pub fn health(&self) -> &Arc<PipelineHealth> {
        &self.health
    }

    /// Results of the most recent run, in sampling order.
    pub fn validation_results(&self) -> &[ValidationResult] {
        &self.results
    }

    /// Dispose the indicator. The coordinator should not run again afterwards.
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("LivenessCoordinator: shutting down");
        self.indicator.dispose().await
    }

    /// Sampling stride for validation; nothing is sampled without a classifier.
    fn sample_every(&self) -> usize {
        match self.classifier {
            Some(_) => self.config.sample_every,
            None => 0,
        }
    }

    fn transition(&mut self, next: RunState) {
        if !self.state.can_transition_to(&next) {
            error!(
                "LivenessCoordinator: invalid transition {} -> {}",
                self.state, next
            );
        }
        info!("LivenessCoordinator: {}", next.description());
        self.state = next;
    }

    /// Run one challenge and replay the result to `sink`.
    ///
    /// Cleanup always runs; on failure the error of the failing phase is
    /// returned after it.
    pub async fn execute(
        &mut self,
        sink: &mut dyn DisplaySink,
        mut hooks: RunHooks<'_>,
    ) -> Result<RunReport> {
        if self.state.is_active() {
            warn!("LivenessCoordinator: previous run was cancelled in {}", self.state);
            self.state = RunState::Idle;
        }
        if self.state.is_finished() {
            self.transition(RunState::Idle);
        }
        self.results.clear();
        self.health.reset();

        let pattern = self.config.challenge_pattern()?;
        info!(
            "LivenessCoordinator: starting run with pattern {} over {:?}",
            pattern,
            pattern.total_duration()
        );

        let started_at = Utc::now();
        let started = Instant::now();
        let mut session = CaptureSession::new(
            Arc::clone(&self.codecs),
            Arc::clone(&self.health),
            self.config.render_interval(),
            Arc::clone(&self.indicator),
        );

        let outcome = self.run(&mut session, &pattern, sink, &mut hooks).await;

        self.transition(RunState::CleaningUp);
        session.cleanup().await;
        info!("LivenessCoordinator: {}", self.health.summary());

        match outcome {
            Ok(mut report) => {
                self.transition(RunState::Completed);
                report.elapsed_ms = started.elapsed().as_millis() as u64;
                report.started_at = started_at;
                report.health = self.health.summary();
                hooks.report(100, "done");
                Ok(report)
            }
            Err(e) => {
                error!("LivenessCoordinator: run failed: {}", e);
                self.transition(RunState::Failed);
                Err(e)
            }
        }
    }

    async fn run(
        &mut self,
        session: &mut CaptureSession,
        pattern: &ChallengePattern,
        sink: &mut dyn DisplaySink,
        hooks: &mut RunHooks<'_>,
    ) -> Result<RunReport> {
        // Source
        self.transition(RunState::AcquiringSource);
        hooks.report(0, "acquiring camera");
        let source = self.provider.acquire().await?;
        let adapter = FrameSourceAdapter::initialize(
            source,
            self.config.first_frame_timeout(),
            Arc::clone(&self.health),
        )
        .await?;
        let settings = adapter.settings();
        session.capture = Some(FrameCaptureService::new(
            adapter.slot(),
            MediaClock::new(),
            Arc::clone(&self.health),
        ));
        session.adapter = Some(adapter);

        // Encoder
        self.transition(RunState::InitializingEncoder);
        hooks.report(10, "preparing encoder");
        session.encoder.initialize(EncoderConfig {
            codec: self.config.codec,
            width: settings.width,
            height: settings.height,
            bitrate: self.config.bitrate,
            framerate: settings.frame_rate,
        })?;

        // Capture
        self.transition(RunState::Capturing);
        hooks.report(15, "capturing");
        session.show_indicator().await?;

        let capture = session
            .capture
            .as_ref()
            .ok_or(Error::NotInitialized("capture service"))?;
        let sample_every = self.sample_every();
        let mut sequencer = ChallengeSequencer::new(pattern, self.config.settle_delay());
        let mut preview_ready = false;

        while let Some(point) = sequencer.next_step(self.indicator.as_ref()).await? {
            let frame = capture.capture_frame().await?;

            if let Some(preview) = hooks.preview.as_deref_mut() {
                if !preview_ready {
                    preview.configure(frame.width(), frame.height()).await?;
                    preview_ready = true;
                }
                preview.draw_frame(&frame).await?;
            }

            if sample_every > 0 && (point.index + 1) % sample_every == 0 {
                session.samples.push(frame.clone());
            }

            session.encoder.encode_frame(frame, point.is_first)?;

            let done = (point.index + 1) * 55 / pattern.len();
            hooks.report(15 + done as u8, "capturing");
        }

        session.encoder.flush()?;
        sequencer.finish().await;
        session.hide_indicator().await?;

        // Decode
        self.transition(RunState::Decoding);
        hooks.report(70, "decoding");
        let chunks = session.encoder.take_chunks();
        if chunks.is_empty() {
            return Err(Error::NoEncodedData);
        }
        session
            .decoder
            .initialize(self.config.codec, settings.width, settings.height)?;
        let frames_rendered = session.decoder.decode_and_render(&chunks, sink).await?;

        // Validate
        match self.classifier.clone() {
            Some(classifier) if !session.samples.is_empty() => {
                self.transition(RunState::Validating);
                hooks.report(85, "validating");
                self.validate(classifier.as_ref(), session, hooks).await;
            }
            Some(_) => info!("LivenessCoordinator: no samples to validate"),
            None => {
                info!("LivenessCoordinator: no classifier configured, skipping validation")
            }
        }

        Ok(RunReport {
            pattern: pattern.to_string(),
            chunks: chunks.len(),
            keyframes: chunks.iter().filter(|c| c.is_key()).count(),
            first_chunk: chunks.first().map(|c| c.kind),
            frames_rendered,
            validation: self.results.clone(),
            started_at: Utc::now(),
            elapsed_ms: 0,
            health: self.health.summary(),
        })
    }

    async fn validate(
        &mut self,
        classifier: &dyn FrameClassifier,
        session: &mut CaptureSession,
        hooks: &mut RunHooks<'_>,
    ) {
        let timeout = self.config.classifier_timeout();
        let samples = std::mem::take(&mut session.samples);
        let total = samples.len();

        for (index, frame) in samples.into_iter().enumerate() {
            let result = match classify_with_timeout(classifier, &frame, timeout).await {
                Ok(result) => result,
                Err(e) => {
                    warn!("LivenessCoordinator: sample {} not classified: {}", index, e);
                    self.health.record_classifier_failure();
                    ValidationResult::failed(e.to_string())
                }
            };
            drop(frame);

            if let Some(on_validation) = hooks.on_validation.as_mut() {
                on_validation(index, &result);
            }
            self.results.push(result);
            hooks.report(85 + ((index + 1) * 14 / total) as u8, "validating");
        }
    }
}
