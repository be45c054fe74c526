//! Drives the indicator through a challenge pattern on a fixed schedule.

use log::{debug, info};
use std::time::Duration;
use tokio::time::Instant;

use crate::challenge::{ChallengePattern, FlashState, IndicatorController};
use crate::error::Result;

/// Display settle delay between a state change and its capture point.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// A moment at which the caller should capture a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturePoint {
    pub index: usize,
    pub state: FlashState,
    pub is_first: bool,
    pub is_last: bool,
}

/// Step-by-step schedule for one pattern.
///
/// Step `i` starts at `start + i * interval`, measured from the first call to
/// [`next_step`](Self::next_step). Work done by the caller between steps
/// eats into the wait before the next step instead of shifting it.
pub struct ChallengeSequencer {
    states: Vec<FlashState>,
    interval: Duration,
    total: Duration,
    settle: Duration,
    start: Option<Instant>,
    next: usize,
}

impl ChallengeSequencer {
    pub fn new(pattern: &ChallengePattern, settle: Duration) -> Self {
        let interval = pattern.interval();
        Self {
            states: pattern.states().to_vec(),
            interval,
            total: pattern.total_duration(),
            // The settle wait never pushes a capture past its own step.
            settle: settle.min(interval),
            start: None,
            next: 0,
        }
    }

    /// Switch the indicator to the next state, wait for it to settle and
    /// return the capture point. `None` once every step was played.
    pub async fn next_step(
        &mut self,
        indicator: &dyn IndicatorController,
    ) -> Result<Option<CapturePoint>> {
        let index = self.next;
        let Some(&state) = self.states.get(index) else {
            return Ok(None);
        };

        let start = match self.start {
            Some(start) => {
                tokio::time::sleep_until(start + self.interval * index as u32).await;
                start
            }
            None => {
                let now = Instant::now();
                self.start = Some(now);
                info!(
                    "ChallengeSequencer: {} steps of {:?}",
                    self.states.len(),
                    self.interval
                );
                now
            }
        };

        indicator.set_state(state).await?;
        tokio::time::sleep(self.settle).await;
        self.next += 1;

        debug!(
            "ChallengeSequencer: step {} ({}) at {:?}",
            index,
            state,
            start.elapsed()
        );
        Ok(Some(CapturePoint {
            index,
            state,
            is_first: index == 0,
            is_last: index + 1 == self.states.len(),
        }))
    }

    /// Hold the final state until the full challenge duration has passed.
    pub async fn finish(&self) {
        if let Some(start) = self.start {
            tokio::time::sleep_until(start + self.total).await;
        }
    }

    pub fn steps_played(&self) -> usize {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingIndicator {
        states: Mutex<Vec<(FlashState, Instant)>>,
    }

    #[async_trait]
    impl IndicatorController for RecordingIndicator {
        async fn set_state(&self, state: FlashState) -> Result<()> {
            self.states.lock().unwrap().push((state, Instant::now()));
            Ok(())
        }
        async fn show(&self) -> Result<()> {
            Ok(())
        }
        async fn hide(&self) -> Result<()> {
            Ok(())
        }
        async fn dispose(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_pattern_in_order_over_total_duration() {
        let pattern = ChallengePattern::parse("BWWBW", Duration::from_millis(1000)).unwrap();
        let indicator = RecordingIndicator::default();
        let mut sequencer = ChallengeSequencer::new(&pattern, DEFAULT_SETTLE_DELAY);

        let started = Instant::now();
        let mut points = Vec::new();
        while let Some(point) = sequencer.next_step(&indicator).await.unwrap() {
            points.push(point);
        }
        sequencer.finish().await;
        let elapsed = started.elapsed();

        let states: Vec<_> = indicator.states.lock().unwrap().iter().map(|(s, _)| *s).collect();
        assert_eq!(states, pattern.states());
        assert_eq!(points.len(), 5);
        assert!(points[0].is_first && !points[0].is_last);
        assert!(points[4].is_last);
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(1010));
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_work_does_not_drift() {
        let pattern = ChallengePattern::parse("BWBW", Duration::from_millis(400)).unwrap();
        let indicator = RecordingIndicator::default();
        let mut sequencer = ChallengeSequencer::new(&pattern, Duration::from_millis(10));

        let started = Instant::now();
        while sequencer.next_step(&indicator).await.unwrap().is_some() {
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        let times = indicator.states.lock().unwrap();
        for (i, (_, at)) in times.iter().enumerate() {
            let offset = at.duration_since(started);
            assert!(offset >= Duration::from_millis(100 * i as u64));
            assert!(offset < Duration::from_millis(100 * i as u64 + 5));
        }
        assert_eq!(sequencer.steps_played(), 4);
    }

    #[test]
    fn test_settle_capped_at_interval() {
        let pattern = ChallengePattern::parse("BW", Duration::from_millis(20)).unwrap();
        let sequencer = ChallengeSequencer::new(&pattern, Duration::from_millis(50));
        assert_eq!(sequencer.settle, Duration::from_millis(10));
    }
}
