//! Runtime configuration.
//!
//! Every option in §6's table lives here as a field with the documented
//! default. `Config::load` overlays an optional JSON file over
//! `Config::default()`; a missing file is not an error.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cadence of the 12-step loop. Default: 500ms.
    pub step_duration: Duration,
    /// Master ticker period. Default: 100ms.
    pub tick_interval: Duration,
    /// Max events in the priority queue. Default: 1024.
    pub queue_capacity: usize,
    /// Working memory size. Default: 7.
    pub wm_capacity: usize,
    /// Load above which Awake→Resting is forced. Default: 0.85.
    pub overload_threshold: f32,
    /// Fatigue above which Awake→Resting is forced. Default: 0.80.
    pub rest_threshold: f32,
    /// Consolidation-need above which Resting→Dreaming. Default: 0.70.
    pub dream_threshold: f32,
    /// Minimum rest before wake/dream eligibility. Default: 5 minutes.
    pub min_rest: Duration,
    /// Upper bound on continuous wake time. Default: 4 hours.
    pub max_awake: Duration,
    /// C5 save cadence. Default: 60s.
    pub persistence_interval: Duration,
    /// Per-call timeout for C3. Default: 30s.
    pub provider_timeout: Duration,
    /// Memory decay halflife for C9 pruning.
    pub retention_halflife: Duration,

    /// Fatigue growth per second while Awake (α in §4.3's fatigue
    /// dynamics). Not named as a separate config key in §6's table; set
    /// here as a documented default (see DESIGN.md open-question log).
    pub fatigue_awake_rate: f32,
    /// Fatigue growth per unit load while Awake (β in §4.3).
    pub fatigue_load_rate: f32,
    /// Fatigue recovery per second while Resting/Dreaming (γ in §4.3).
    pub fatigue_recovery_rate: f32,
    /// Consolidation-need growth per unconsolidated recent thought.
    pub consolidation_need_rate: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            step_duration: Duration::from_millis(500),
            tick_interval: Duration::from_millis(100),
            queue_capacity: 1024,
            wm_capacity: 7,
            overload_threshold: 0.85,
            rest_threshold: 0.80,
            dream_threshold: 0.70,
            min_rest: Duration::from_secs(5 * 60),
            max_awake: Duration::from_secs(4 * 60 * 60),
            persistence_interval: Duration::from_secs(60),
            provider_timeout: Duration::from_secs(30),
            retention_halflife: Duration::from_secs(24 * 60 * 60),
            fatigue_awake_rate: 0.02,
            fatigue_load_rate: 0.05,
            fatigue_recovery_rate: 0.05,
            consolidation_need_rate: 0.01,
        }
    }
}

impl Config {
    /// Loads `Config::default()` overlaid with the JSON file at `path`,
    /// if it exists. A missing file is not an error (§6 — "Reads
    /// tolerate missing files").
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// A speed-compressed preset useful for tests and demos: every
    /// duration divided by `factor`, thresholds unchanged.
    #[must_use]
    pub fn accelerated(factor: u32) -> Self {
        let base = Self::default();
        Self {
            step_duration: base.step_duration / factor,
            tick_interval: base.tick_interval / factor,
            min_rest: base.min_rest / factor,
            max_awake: base.max_awake / factor,
            persistence_interval: base.persistence_interval / factor,
            ..base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_values() {
        let config = Config::default();
        assert_eq!(config.step_duration, Duration::from_millis(500));
        assert_eq!(config.tick_interval, Duration::from_millis(100));
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.wm_capacity, 7);
        assert!((config.overload_threshold - 0.85).abs() < f32::EPSILON);
        assert!((config.rest_threshold - 0.80).abs() < f32::EPSILON);
        assert!((config.dream_threshold - 0.70).abs() < f32::EPSILON);
        assert_eq!(config.min_rest, Duration::from_secs(300));
        assert_eq!(config.max_awake, Duration::from_secs(14_400));
        assert_eq!(config.persistence_interval, Duration::from_secs(60));
        assert_eq!(config.provider_timeout, Duration::from_secs(30));
    }

    #[test]
    fn load_tolerates_missing_file() {
        let config = Config::load(Path::new("/nonexistent/echobeats-config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn accelerated_shrinks_durations_not_thresholds() {
        let config = Config::accelerated(10);
        assert_eq!(config.step_duration, Duration::from_millis(50));
        assert!((config.overload_threshold - 0.85).abs() < f32::EPSILON);
    }
}
