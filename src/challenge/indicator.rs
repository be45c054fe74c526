//! Indicator controller seam

use async_trait::async_trait;
use log::debug;
use tokio::sync::watch;

use crate::challenge::FlashState;
use crate::error::Result;

/// What the flashing surface currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndicatorSignal {
    pub state: FlashState,
    pub visible: bool,
}

/// Surface that flashes the challenge at the subject.
#[async_trait]
pub trait IndicatorController: Send + Sync {
    async fn set_state(&self, state: FlashState) -> Result<()>;
    async fn show(&self) -> Result<()>;
    async fn hide(&self) -> Result<()>;
    async fn dispose(&self) -> Result<()>;
}

/// Indicator that publishes its state on a watch channel.
///
/// A [`LoopbackSource`](crate::capture::LoopbackSource) subscribed to the
/// channel films whatever the indicator shows.
pub struct LoopbackIndicator {
    signal_tx: watch::Sender<IndicatorSignal>,
}

impl LoopbackIndicator {
    pub fn new() -> (Self, watch::Receiver<IndicatorSignal>) {
        let (signal_tx, signal_rx) = watch::channel(IndicatorSignal::default());
        (Self { signal_tx }, signal_rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<IndicatorSignal> {
        self.signal_tx.subscribe()
    }

    pub fn current(&self) -> IndicatorSignal {
        *self.signal_tx.borrow()
    }
}

#[async_trait]
impl IndicatorController for LoopbackIndicator {
    async fn set_state(&self, state: FlashState) -> Result<()> {
        debug!("LoopbackIndicator: state {}", state);
        self.signal_tx.send_modify(|signal| signal.state = state);
        Ok(())
    }

    async fn show(&self) -> Result<()> {
        self.signal_tx.send_modify(|signal| signal.visible = true);
        Ok(())
    }

    async fn hide(&self) -> Result<()> {
        self.signal_tx.send_modify(|signal| signal.visible = false);
        Ok(())
    }

    async fn dispose(&self) -> Result<()> {
        self.signal_tx.send_replace(IndicatorSignal::default());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loopback_publishes_state() {
        let (indicator, rx) = LoopbackIndicator::new();
        indicator.show().await.unwrap();
        indicator.set_state(FlashState::White).await.unwrap();
        assert_eq!(
            *rx.borrow(),
            IndicatorSignal {
                state: FlashState::White,
                visible: true
            }
        );

        indicator.hide().await.unwrap();
        assert!(!indicator.current().visible);
        indicator.dispose().await.unwrap();
        assert_eq!(indicator.current(), IndicatorSignal::default());
    }
}
