//! EchoBeats loop types: the fixed step table, per-step execution
//! records, and cumulative cycle metrics.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::types::{Mode, Phase};

/// One row of the fixed step → phase/mode table (§4.5). The table itself
/// lives in [`STEP_TABLE`]; `Engine` selection reuses `phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSlot {
    pub step: u8,
    pub phase: Phase,
    pub mode: Mode,
}

/// The canonical 12-step cadence. Index 0 is step 1.
pub const STEP_TABLE: [StepSlot; 12] = [
    StepSlot { step: 1, phase: Phase::Relevance, mode: Mode::Expressive },
    StepSlot { step: 2, phase: Phase::Affordance, mode: Mode::Expressive },
    StepSlot { step: 3, phase: Phase::Affordance, mode: Mode::Expressive },
    StepSlot { step: 4, phase: Phase::Affordance, mode: Mode::Expressive },
    StepSlot { step: 5, phase: Phase::Affordance, mode: Mode::Expressive },
    StepSlot { step: 6, phase: Phase::Affordance, mode: Mode::Expressive },
    StepSlot { step: 7, phase: Phase::Relevance, mode: Mode::Expressive },
    StepSlot { step: 8, phase: Phase::Salience, mode: Mode::Reflective },
    StepSlot { step: 9, phase: Phase::Salience, mode: Mode::Reflective },
    StepSlot { step: 10, phase: Phase::Salience, mode: Mode::Reflective },
    StepSlot { step: 11, phase: Phase::Salience, mode: Mode::Reflective },
    StepSlot { step: 12, phase: Phase::Salience, mode: Mode::Reflective },
];

/// Steps 1 and 7: the only points where focus may be re-oriented mid-cycle.
pub fn is_pivotal_relevance_realization(step: u8) -> bool {
    step == 1 || step == 7
}

pub fn slot_for_step(step: u8) -> StepSlot {
    STEP_TABLE[usize::from(step.saturating_sub(1)) % STEP_TABLE.len()]
}

/// The record C8 keeps for each executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepExecution {
    pub step: u8,
    pub phase: Phase,
    pub mode: Mode,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub duration: Duration,
    pub success: bool,
    pub output: serde_json::Value,
    pub error: Option<String>,
    pub degraded: bool,
}

/// Cumulative counters surfaced by `CognitiveLoop::metrics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleMetrics {
    pub cycles_completed: u64,
    pub steps_executed: u64,
    pub steps_failed: u64,
    pub total_duration: Duration,
    pub thoughts_produced: u64,
    pub insights_produced: u64,
}

impl CycleMetrics {
    pub fn record_step(&mut self, execution: &StepExecution) {
        self.steps_executed += 1;
        self.total_duration += execution.duration;
        if !execution.success {
            self.steps_failed += 1;
        }
    }

    pub fn record_cycle(&mut self) {
        self.cycles_completed += 1;
    }
}
