//! Synthetic media sources.
//!
//! These stand in for a camera: a loopback that films the indicator state, a
//! counting test pattern, and a scripted list of colors.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::time::{Interval, MissedTickBehavior};

use crate::capture::frame_pool::FramePool;
use crate::capture::{Frame, MediaSource, MediaSourceProvider, SourceSettings};
use crate::challenge::IndicatorSignal;
use crate::error::Result;
use crate::pipeline::clock::MediaClock;

/// Color seen by the loopback camera while the indicator is hidden.
pub const IDLE_GRAY: [u8; 3] = [128, 128, 128];

fn ticker(settings: &SourceSettings) -> Interval {
    let mut interval = tokio::time::interval(settings.frame_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

// ── Loopback ────────────────────────────────────────────────────

/// Camera pointed at the indicator: every frame is a solid image of the
/// currently commanded indicator color.
pub struct LoopbackSource {
    settings: SourceSettings,
    signal_rx: watch::Receiver<IndicatorSignal>,
    pool: FramePool,
    clock: MediaClock,
    ticker: Option<Interval>,
    stopped: Arc<AtomicBool>,
}

impl LoopbackSource {
    pub fn new(settings: SourceSettings, signal_rx: watch::Receiver<IndicatorSignal>) -> Self {
        let pool = FramePool::new(settings.width, settings.height);
        Self::with_pool(settings, signal_rx, pool)
    }

    pub fn with_pool(
        settings: SourceSettings,
        signal_rx: watch::Receiver<IndicatorSignal>,
        pool: FramePool,
    ) -> Self {
        Self {
            settings,
            signal_rx,
            pool,
            clock: MediaClock::new(),
            ticker: None,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stopped_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopped)
    }
}

#[async_trait]
impl MediaSource for LoopbackSource {
    fn settings(&self) -> SourceSettings {
        self.settings
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.stopped.load(Ordering::Acquire) {
            return Ok(None);
        }
        let settings = self.settings;
        self.ticker
            .get_or_insert_with(|| ticker(&settings))
            .tick()
            .await;

        let color = {
            let signal = self.signal_rx.borrow();
            if signal.visible {
                signal.state.rgb()
            } else {
                IDLE_GRAY
            }
        };
        Ok(Some(self.pool.solid(
            settings.width,
            settings.height,
            color,
            self.clock.now(),
        )))
    }

    async fn stop(&mut self) -> Result<()> {
        self.stopped.store(true, Ordering::Release);
        Ok(())
    }
}

/// Provider handing out loopback sources bound to one indicator.
///
/// All sources share one frame pool so leaks across runs are observable.
pub struct LoopbackProvider {
    settings: SourceSettings,
    signal_rx: watch::Receiver<IndicatorSignal>,
    pool: FramePool,
}

impl LoopbackProvider {
    pub fn new(settings: SourceSettings, signal_rx: watch::Receiver<IndicatorSignal>) -> Self {
        Self {
            settings,
            signal_rx,
            pool: FramePool::new(settings.width, settings.height),
        }
    }

    pub fn pool(&self) -> FramePool {
        self.pool.clone()
    }
}

#[async_trait]
impl MediaSourceProvider for LoopbackProvider {
    async fn acquire(&self) -> Result<Box<dyn MediaSource>> {
        Ok(Box::new(LoopbackSource::with_pool(
            self.settings,
            self.signal_rx.clone(),
            self.pool.clone(),
        )))
    }
}

// ── Test pattern ────────────────────────────────────────────────

/// Frames filled with a single byte that increments every frame.
pub struct TestPatternSource {
    settings: SourceSettings,
    pool: FramePool,
    clock: MediaClock,
    ticker: Option<Interval>,
    throttled: bool,
    counter: u8,
    stopped: Arc<AtomicBool>,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32, frame_rate: u32) -> Self {
        Self {
            settings: SourceSettings::new(width, height, frame_rate),
            pool: FramePool::new(width, height),
            clock: MediaClock::new(),
            ticker: None,
            throttled: true,
            counter: 0,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Produce frames as fast as the consumer takes them.
    pub fn unthrottled(mut self) -> Self {
        self.throttled = false;
        self
    }

    pub fn pool(&self) -> FramePool {
        self.pool.clone()
    }

    pub fn stopped_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopped)
    }
}

#[async_trait]
impl MediaSource for TestPatternSource {
    fn settings(&self) -> SourceSettings {
        self.settings
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.stopped.load(Ordering::Acquire) {
            return Ok(None);
        }
        if self.throttled {
            let settings = self.settings;
            self.ticker
                .get_or_insert_with(|| ticker(&settings))
                .tick()
                .await;
        } else {
            tokio::task::yield_now().await;
        }

        self.counter = self.counter.wrapping_add(1);
        let value = self.counter;
        let (w, h) = (self.settings.width, self.settings.height);
        Ok(Some(self.pool.take(w, h, self.clock.now(), |data| {
            data.fill(value)
        })))
    }

    async fn stop(&mut self) -> Result<()> {
        self.stopped.store(true, Ordering::Release);
        Ok(())
    }
}

// ── Scripted ────────────────────────────────────────────────────

/// Plays a fixed list of solid colors, one per frame interval, then ends.
/// A silent source never produces anything.
pub struct ScriptedSource {
    settings: SourceSettings,
    colors: VecDeque<[u8; 3]>,
    silent: bool,
    pool: FramePool,
    clock: MediaClock,
    stopped: Arc<AtomicBool>,
}

impl ScriptedSource {
    pub fn finite(width: u32, height: u32, colors: Vec<[u8; 3]>) -> Self {
        Self {
            settings: SourceSettings::new(width, height, 30),
            colors: colors.into(),
            silent: false,
            pool: FramePool::new(width, height),
            clock: MediaClock::new(),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn silent(width: u32, height: u32) -> Self {
        Self {
            silent: true,
            ..Self::finite(width, height, Vec::new())
        }
    }

    pub fn pool(&self) -> FramePool {
        self.pool.clone()
    }

    pub fn stopped_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopped)
    }
}

#[async_trait]
impl MediaSource for ScriptedSource {
    fn settings(&self) -> SourceSettings {
        self.settings
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.silent {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.settings.frame_interval()).await;
        if self.stopped.load(Ordering::Acquire) {
            return Ok(None);
        }
        let (w, h) = (self.settings.width, self.settings.height);
        Ok(self
            .colors
            .pop_front()
            .map(|rgb| self.pool.solid(w, h, rgb, self.clock.now())))
    }

    async fn stop(&mut self) -> Result<()> {
        self.stopped.store(true, Ordering::Release);
        Ok(())
    }
}
