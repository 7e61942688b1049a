//! C1 — Clock & Ticker source.
//!
//! A thin wrapper around `tokio::time::interval` plus a shared
//! `CancellationToken` so every long-running task (tick loop,
//! persistence loop, interaction loop, dream loop) can be cancelled
//! together from one place (§5).

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Master ticker: emits a tick every `tick_interval`, cancellable.
pub struct Clock {
    interval: Interval,
    cancellation: CancellationToken,
}

/// What happened when waiting for the next tick.
pub enum TickSource {
    Tick(Instant),
    Cancelled,
}

impl Clock {
    #[must_use]
    pub fn new(tick_interval: Duration, cancellation: CancellationToken) -> Self {
        let mut interval = tokio::time::interval(tick_interval);
        // A slow consumer should not cause a burst of catch-up ticks.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            cancellation,
        }
    }

    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Waits for the next tick or for cancellation, whichever comes first.
    pub async fn tick(&mut self) -> TickSource {
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => TickSource::Cancelled,
            instant = self.interval.tick() => TickSource::Tick(instant),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn tick_fires_after_interval() {
        let token = CancellationToken::new();
        let mut clock = Clock::new(Duration::from_millis(10), token);
        assert!(matches!(clock.tick().await, TickSource::Tick(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_short_circuits_the_wait() {
        let token = CancellationToken::new();
        token.cancel();
        let mut clock = Clock::new(Duration::from_secs(3600), token);
        assert!(matches!(clock.tick().await, TickSource::Cancelled));
    }
}
