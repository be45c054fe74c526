//! Latest-frame buffer fed by a background consumer.
//!
//! The [`FrameSourceAdapter`] owns the media source for the lifetime of a run
//! and drains it on a spawned task. Only the most recent frame is kept, in a
//! [`FrameSlot`] guarded by a single async mutex: the producer's replace step
//! and every clone taken at a capture point go through that lock, so a frame
//! is never released while it is being copied.

use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::capture::{Frame, MediaSource, SourceSettings};
use crate::error::{Error, Result};
use crate::pipeline::health::PipelineHealth;

/// Single-slot cell holding the most recent frame.
pub struct FrameSlot {
    current: Mutex<Option<Frame>>,
    seen_tx: watch::Sender<bool>,
    health: Arc<PipelineHealth>,
}

/// Lock-scoped, read-only borrow of the frame currently in the slot.
pub struct FrameRef<'a>(MappedMutexGuard<'a, Frame>);

impl std::ops::Deref for FrameRef<'_> {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        &self.0
    }
}

impl FrameSlot {
    pub fn new(health: Arc<PipelineHealth>) -> Self {
        let (seen_tx, _) = watch::channel(false);
        Self {
            current: Mutex::new(None),
            seen_tx,
            health,
        }
    }

    /// Store `frame` and release the previous one.
    ///
    /// Waits for any in-flight clone to finish before the old frame leaves the
    /// slot.
    pub async fn replace(&self, frame: Frame) {
        let previous = {
            let mut current = self.current.lock().await;
            current.replace(frame)
        };
        drop(previous);

        self.health.record_frame_received();
        self.seen_tx.send_if_modified(|seen| {
            if *seen {
                false
            } else {
                *seen = true;
                true
            }
        });
    }

    /// Borrow the current frame without taking ownership.
    pub async fn peek(&self) -> Option<FrameRef<'_>> {
        let guard = self.current.lock().await;
        MutexGuard::try_map(guard, |slot| slot.as_mut())
            .ok()
            .map(FrameRef)
    }

    /// Independent copy of the current frame.
    pub async fn take_clone(&self) -> Result<Frame> {
        let current = self.current.lock().await;
        current.as_ref().map(Frame::clone).ok_or(Error::NoFrameAvailable)
    }

    /// Release the held frame, if any.
    pub async fn clear(&self) {
        let previous = self.current.lock().await.take();
        drop(previous);
    }

    /// True once the producer delivered at least one frame.
    pub fn has_seen_frame(&self) -> bool {
        *self.seen_tx.borrow()
    }

    /// Block until the first frame arrives, bounded by `timeout`.
    pub async fn wait_first(&self, timeout: Duration) -> Result<()> {
        let mut seen_rx = self.seen_tx.subscribe();
        match tokio::time::timeout(timeout, seen_rx.wait_for(|seen| *seen)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(Error::Source("frame slot closed".into())),
            Err(_) => Err(Error::SourceTimeout(timeout)),
        }
    }
}

/// Keeps a live source drained into a [`FrameSlot`].
pub struct FrameSourceAdapter {
    slot: Arc<FrameSlot>,
    settings: SourceSettings,
    cancel: CancellationToken,
    /// Resolves to the result of stopping the source
    consumer: Option<JoinHandle<Result<()>>>,
}

impl FrameSourceAdapter {
    /// Start consuming `source` and wait for its first frame.
    ///
    /// On timeout the source is stopped before `SourceTimeout` is returned.
    pub async fn initialize(
        source: Box<dyn MediaSource>,
        first_frame_timeout: Duration,
        health: Arc<PipelineHealth>,
    ) -> Result<Self> {
        let settings = source.settings();
        let slot = Arc::new(FrameSlot::new(health));
        let cancel = CancellationToken::new();
        let consumer = tokio::spawn(consume(source, Arc::clone(&slot), cancel.clone()));

        let mut adapter = Self {
            slot,
            settings,
            cancel,
            consumer: Some(consumer),
        };

        info!(
            "FrameSourceAdapter: waiting for first frame ({}x{} @ {} fps)",
            settings.width, settings.height, settings.frame_rate
        );
        if let Err(e) = adapter.slot.wait_first(first_frame_timeout).await {
            error!("FrameSourceAdapter: {}", e);
            if let Err(stop_err) = adapter.dispose().await {
                warn!("FrameSourceAdapter: stop after failed start: {}", stop_err);
            }
            return Err(e);
        }

        Ok(adapter)
    }

    pub fn slot(&self) -> Arc<FrameSlot> {
        Arc::clone(&self.slot)
    }

    pub fn settings(&self) -> SourceSettings {
        self.settings
    }

    /// Latest frame reference; ownership stays with the slot.
    pub async fn current_frame(&self) -> Option<FrameRef<'_>> {
        self.slot.peek().await
    }

    /// True while the consumer task is alive.
    pub fn is_running(&self) -> bool {
        self.consumer.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop consumption, stop the source and release the held frame.
    ///
    /// Idempotent. The source is stopped by the consumer task itself, so it is
    /// stopped exactly once even when the adapter is dropped without a dispose.
    pub async fn dispose(&mut self) -> Result<()> {
        self.cancel.cancel();
        let Some(consumer) = self.consumer.take() else {
            return Ok(());
        };

        let result = match consumer.await {
            Ok(stopped) => stopped,
            Err(e) => Err(Error::CleanupError(format!(
                "frame consumer task failed: {}",
                e
            ))),
        };
        self.slot.clear().await;
        info!("FrameSourceAdapter: disposed");
        result
    }
}

impl Drop for FrameSourceAdapter {
    fn drop(&mut self) {
        if self.consumer.is_some() {
            warn!("FrameSourceAdapter: dropped while running, stopping source in background");
        }
        self.cancel.cancel();
    }
}

async fn consume(
    mut source: Box<dyn MediaSource>,
    slot: Arc<FrameSlot>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut frames = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = source.next_frame() => match next {
                Ok(Some(frame)) => {
                    if frames == 0 {
                        info!("FrameSourceAdapter: first frame received at {}", frame.timestamp());
                    }
                    frames += 1;
                    slot.replace(frame).await;
                }
                Ok(None) => {
                    info!("FrameSourceAdapter: end of source");
                    break;
                }
                Err(e) => {
                    error!("FrameSourceAdapter: source failed: {}", e);
                    break;
                }
            }
        }
    }

    info!("FrameSourceAdapter: consumer stopped after {} frames", frames);
    let stopped = source.stop().await;
    if let Err(e) = &stopped {
        warn!("FrameSourceAdapter: source stop failed: {}", e);
    }
    stopped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::synthetic::{ScriptedSource, TestPatternSource};
    use crate::pipeline::types::Timestamp;

    fn health() -> Arc<PipelineHealth> {
        Arc::new(PipelineHealth::new())
    }

    #[tokio::test]
    async fn test_slot_keeps_only_latest() {
        let slot = FrameSlot::new(health());
        assert!(matches!(slot.take_clone().await, Err(Error::NoFrameAvailable)));

        slot.replace(Frame::solid(1, 1, [1, 1, 1], Timestamp::from_micros(1)))
            .await;
        slot.replace(Frame::solid(1, 1, [2, 2, 2], Timestamp::from_micros(2)))
            .await;

        let frame = slot.take_clone().await.unwrap();
        assert_eq!(frame.mean_rgb(), [2, 2, 2]);
        assert!(slot.has_seen_frame());
        assert_eq!(slot.peek().await.unwrap().timestamp().micros, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_waits_for_first_frame() {
        let source = TestPatternSource::new(8, 8, 30);
        let pool = source.pool();
        let stopped = source.stopped_flag();

        let mut adapter = FrameSourceAdapter::initialize(
            Box::new(source),
            Duration::from_secs(5),
            health(),
        )
        .await
        .unwrap();

        assert!(adapter.current_frame().await.is_some());
        assert!(adapter.is_running());

        adapter.dispose().await.unwrap();
        adapter.dispose().await.unwrap();
        assert!(stopped.load(std::sync::atomic::Ordering::SeqCst));
        assert!(adapter.current_frame().await.is_none());
        assert_eq!(pool.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_times_out_and_stops_source() {
        let source = ScriptedSource::silent(8, 8);
        let stopped = source.stopped_flag();

        let result = FrameSourceAdapter::initialize(
            Box::new(source),
            Duration::from_secs(5),
            health(),
        )
        .await;

        assert!(matches!(result, Err(Error::SourceTimeout(d)) if d == Duration::from_secs(5)));
        assert!(stopped.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_of_source_keeps_last_frame() {
        let source = ScriptedSource::finite(4, 4, vec![[10, 10, 10], [20, 20, 20]]);
        let mut adapter = FrameSourceAdapter::initialize(
            Box::new(source),
            Duration::from_secs(1),
            health(),
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!adapter.is_running());
        assert_eq!(adapter.current_frame().await.unwrap().mean_rgb(), [20, 20, 20]);
        adapter.dispose().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_adapter_stops_source() {
        let source = TestPatternSource::new(8, 8, 30);
        let pool = source.pool();
        let stopped = source.stopped_flag();

        let adapter = FrameSourceAdapter::initialize(
            Box::new(source),
            Duration::from_secs(5),
            health(),
        )
        .await
        .unwrap();
        drop(adapter);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(stopped.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(pool.outstanding(), 0);
    }
}
