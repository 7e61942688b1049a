//! C6 — Wake/Rest/Dream Manager.
//!
//! A state machine over `{Awake, Resting, Dreaming}` driven by load and
//! fatigue, guarded by a single mutex (§5 — "C6 uses a mutex around its
//! state"). `consolidation_need` is an internal pressure metric, not
//! part of the persisted `LifecycleState` (§3 only persists mode,
//! entered_at, fatigue, last_dream_at).

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::core::types::LifecycleMode as Mode;
use crate::core::types::LifecycleState;

struct Inner {
    state: LifecycleState,
    consolidation_need: f32,
    unconsolidated_thoughts: u32,
    wake_deferred: bool,
}

pub struct LifecycleManager {
    inner: Mutex<Inner>,
    overload_threshold: f32,
    rest_threshold: f32,
    dream_threshold: f32,
    min_rest: std::time::Duration,
    max_awake: std::time::Duration,
    fatigue_awake_rate: f32,
    fatigue_load_rate: f32,
    fatigue_recovery_rate: f32,
    consolidation_need_rate: f32,
}

impl LifecycleManager {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: LifecycleState::new(),
                consolidation_need: 0.0,
                unconsolidated_thoughts: 0,
                wake_deferred: false,
            }),
            overload_threshold: config.overload_threshold,
            rest_threshold: config.rest_threshold,
            dream_threshold: config.dream_threshold,
            min_rest: config.min_rest,
            max_awake: config.max_awake,
            fatigue_awake_rate: config.fatigue_awake_rate,
            fatigue_load_rate: config.fatigue_load_rate,
            fatigue_recovery_rate: config.fatigue_recovery_rate,
            consolidation_need_rate: config.consolidation_need_rate,
        }
    }

    /// Advances fatigue and, if eligible, transitions the lifecycle
    /// state (§4.3's table). `load` is C8's current cognitive load.
    /// Returns the mode after this tick.
    pub async fn on_tick(&self, now: DateTime<Utc>, dt: std::time::Duration, load: f32) -> Mode {
        let mut inner = self.inner.lock().await;
        let dt_secs = dt.as_secs_f32();

        match inner.state.mode {
            Mode::Awake => {
                let fatigue =
                    inner.state.fatigue + self.fatigue_awake_rate * dt_secs + self.fatigue_load_rate * load;
                inner.state.set_fatigue(fatigue);

                let awake_for = now
                    .signed_duration_since(inner.state.entered_at)
                    .to_std()
                    .unwrap_or_default();
                let overlong = awake_for >= self.max_awake;

                if inner.state.fatigue >= self.rest_threshold || load >= self.overload_threshold || overlong {
                    inner.state.transition_to(Mode::Resting, now);
                }
            }
            Mode::Resting => {
                let fatigue = inner.state.fatigue - self.fatigue_recovery_rate * dt_secs;
                inner.state.set_fatigue(fatigue);

                let rested = now
                    .signed_duration_since(inner.state.entered_at)
                    .to_std()
                    .unwrap_or_default()
                    >= self.min_rest;

                if rested {
                    if inner.consolidation_need >= self.dream_threshold {
                        inner.state.transition_to(Mode::Dreaming, now);
                    } else {
                        inner.state.transition_to(Mode::Awake, now);
                    }
                }
            }
            Mode::Dreaming => {
                let fatigue = inner.state.fatigue - self.fatigue_recovery_rate * dt_secs;
                inner.state.set_fatigue(fatigue);
                // Stays Dreaming until `on_consolidation_done` is called
                // explicitly by C9 (§4.3 — "Dreaming, consolidation-done -> Awake").
            }
        }
        inner.state.mode
    }

    /// C9 calls this when consolidation finishes: always transitions to
    /// Awake, resets consolidation-need, and restores fatigue to
    /// baseline (§4.6).
    pub async fn on_consolidation_done(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.lock().await;
        inner.state.transition_to(Mode::Awake, now);
        inner.state.set_fatigue(0.0);
        inner.consolidation_need = 0.0;
        inner.unconsolidated_thoughts = 0;
        inner.wake_deferred = false;
    }

    /// An external wake request. Honored immediately unless currently
    /// Dreaming, in which case it is deferred (not dropped) until the
    /// next eligible Resting period (§4.3, §9).
    pub async fn request_wake(&self, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state.mode == Mode::Dreaming {
            inner.wake_deferred = true;
            false
        } else {
            inner.state.transition_to(Mode::Awake, now);
            true
        }
    }

    pub async fn record_unconsolidated_thought(&self) {
        let mut inner = self.inner.lock().await;
        inner.unconsolidated_thoughts += 1;
        inner.consolidation_need =
            (inner.consolidation_need + self.consolidation_need_rate).clamp(0.0, 1.0);
    }

    pub async fn snapshot(&self) -> LifecycleState {
        self.inner.lock().await.state.clone()
    }

    /// Seeds mode, fatigue, and last-dream-at from a loaded snapshot so a
    /// restarted process resumes the lifecycle it left off in rather than
    /// starting fresh `Awake` (§1, §8). `entered_at` cannot be recovered
    /// from the snapshot, so it is set to `now`.
    pub async fn restore(&self, mode: Mode, fatigue: f32, last_dream_at: Option<DateTime<Utc>>, now: DateTime<Utc>) {
        let mut inner = self.inner.lock().await;
        inner.state.mode = mode;
        inner.state.entered_at = now;
        inner.state.set_fatigue(fatigue);
        inner.state.last_dream_at = last_dream_at;
    }

    pub async fn consolidation_need(&self) -> f32 {
        self.inner.lock().await.consolidation_need
    }

    pub async fn mode(&self) -> Mode {
        self.inner.lock().await.state.mode
    }
}
