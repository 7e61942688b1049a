//! C8 — The 12-Step Cognitive Loop.
//!
//! Ties together the engine trio (C7), memory (C4), and the lifecycle
//! manager (C6): each call to [`CognitiveLoop::run_step`] builds a
//! [`StepContext`] from the current slot in [`STEP_TABLE`], dispatches to
//! the engine whose `phase()` matches, applies the returned
//! [`StatePatch`], and advances the step/cycle counters. Advancement is
//! gated on C6 reporting `Awake` — while Resting or Dreaming, a call
//! returns `None` rather than running a step (§4.5, §9).

pub mod types;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::core::types::{CognitiveEvent, CognitiveState, LifecycleMode, MemoryNodeId};
use crate::engines::provider::FallbackChain;
use crate::engines::{AffordanceEngine, Engine, RelevanceEngine, SalienceEngine, StateSnapshot, StepContext};
use crate::lifecycle::LifecycleManager;
use crate::memory::Memory;
use crate::queue::EventQueue;

use types::{slot_for_step, CycleMetrics, StepExecution, STEP_TABLE};

struct Engines {
    affordance: AffordanceEngine,
    relevance: RelevanceEngine,
    salience: SalienceEngine,
}

impl Engines {
    fn for_phase(&self, phase: crate::core::types::Phase) -> &dyn Engine {
        use crate::core::types::Phase;
        match phase {
            Phase::Affordance => &self.affordance,
            Phase::Relevance => &self.relevance,
            Phase::Salience => &self.salience,
        }
    }
}

/// Owns the per-cycle [`CognitiveState`] and drives one step at a time.
/// Memory, the queue, and the lifecycle manager are shared with the rest
/// of the runtime, so this holds them as `Arc`s rather than owning them.
pub struct CognitiveLoop {
    memory: Arc<Memory>,
    queue: Arc<EventQueue>,
    lifecycle: Arc<LifecycleManager>,
    provider: Arc<FallbackChain>,
    engines: Engines,
    state: Mutex<CognitiveState>,
    metrics: Mutex<CycleMetrics>,
}

impl CognitiveLoop {
    #[must_use]
    pub fn new(
        memory: Arc<Memory>,
        queue: Arc<EventQueue>,
        lifecycle: Arc<LifecycleManager>,
        provider: Arc<FallbackChain>,
    ) -> Self {
        Self {
            memory,
            queue,
            lifecycle,
            provider,
            engines: Engines {
                affordance: AffordanceEngine::new(),
                relevance: RelevanceEngine::new(),
                salience: SalienceEngine::new(),
            },
            state: Mutex::new(CognitiveState::new()),
            metrics: Mutex::new(CycleMetrics::default()),
        }
    }

    pub async fn state(&self) -> CognitiveState {
        self.state.lock().await.clone()
    }

    pub async fn metrics(&self) -> CycleMetrics {
        self.metrics.lock().await.clone()
    }

    /// Seeds the cycle counter and cumulative thought/insight production
    /// counters from a loaded snapshot, so a restarted process resumes
    /// counting forward instead of regressing to zero (§1, §8).
    pub async fn restore(&self, cycle_count: u64, total_thoughts: u64, total_insights: u64) {
        self.state.lock().await.cycle_count = cycle_count;
        let mut metrics = self.metrics.lock().await;
        metrics.thoughts_produced = total_thoughts;
        metrics.insights_produced = total_insights;
    }

    /// Runs exactly one step of the cadence if C6 reports `Awake`;
    /// returns `None` without doing any work otherwise (the tick loop
    /// keeps calling this every `step_duration` regardless of mode —
    /// C8 itself enforces the gate, per §4.5's "advancement pauses
    /// while Resting or Dreaming").
    pub async fn run_step(&self, now: DateTime<Utc>) -> Option<StepExecution> {
        if self.lifecycle.mode().await != LifecycleMode::Awake {
            return None;
        }

        let started_at = now;
        let step = {
            let state = self.state.lock().await;
            state.step_index
        };
        let slot = slot_for_step(step);

        let snapshot = {
            let state = self.state.lock().await;
            StateSnapshot {
                state: state.clone(),
                working_memory_nodes: state.working_memory.iter().copied().collect(),
            }
        };
        let cycle_count = snapshot.state.cycle_count;

        let ctx = StepContext {
            step,
            phase: slot.phase,
            mode: slot.mode,
            cycle_count,
            previous_outputs: std::collections::HashMap::new(),
            snapshot,
            memory: self.memory.clone(),
            provider: self.provider.clone(),
        };

        let engine = self.engines.for_phase(slot.phase);
        let outcome = engine.process(&ctx).await;

        let execution = match outcome {
            Ok(result) => {
                self.apply_patch(&result.patch).await;
                for event in result.events {
                    if let Err(e) = self.queue.schedule(event).await {
                        warn!(error = %e, "failed to schedule event produced by step {step}");
                    }
                }
                StepExecution {
                    step,
                    phase: slot.phase,
                    mode: slot.mode,
                    started_at,
                    duration: (Utc::now() - started_at).to_std().unwrap_or_default(),
                    success: true,
                    output: result.output,
                    error: None,
                    degraded: result.degraded,
                }
            }
            Err(e) => {
                warn!(error = %e, step, "engine returned an error; step recorded as failed");
                StepExecution {
                    step,
                    phase: slot.phase,
                    mode: slot.mode,
                    started_at,
                    duration: (Utc::now() - started_at).to_std().unwrap_or_default(),
                    success: false,
                    output: serde_json::Value::Null,
                    error: Some(e.to_string()),
                    degraded: true,
                }
            }
        };

        self.advance_step(step).await;
        self.metrics.lock().await.record_step(&execution);
        debug!(step, phase = ?slot.phase, success = execution.success, "step complete");
        Some(execution)
    }

    async fn apply_patch(&self, patch: &crate::engines::StatePatch) {
        let mut produced_thought = false;
        let mut produced_insight = false;
        {
            let mut state = self.state.lock().await;
            if let Some(id) = patch.push_working_memory {
                state.push_working_memory(id);
                produced_thought = true;
            }
            if let Some(id) = patch.push_insight {
                state.push_insight(id);
                produced_insight = true;
            }
            if let Some(load) = patch.cognitive_load {
                state.set_cognitive_load(load);
            }
            if let Some(id) = patch.refocus {
                state.push_working_memory(id);
                produced_thought = true;
            }
        }
        if produced_insight {
            self.lifecycle.record_unconsolidated_thought().await;
        }
        if produced_thought || produced_insight {
            let mut metrics = self.metrics.lock().await;
            if produced_thought {
                metrics.thoughts_produced += 1;
            }
            if produced_insight {
                metrics.insights_produced += 1;
            }
        }
    }

    /// Advances the step index, wrapping from 12 back to 1 and clearing
    /// the cycle-scoped insights list at that boundary (§4.5, §8).
    async fn advance_step(&self, completed_step: u8) {
        let mut state = self.state.lock().await;
        if completed_step >= STEP_TABLE.len() as u8 {
            state.clear_insights();
            state.cycle_count += 1;
            state.step_index = 1;
            self.metrics.lock().await.record_cycle();
        } else {
            state.step_index = completed_step + 1;
        }
    }

    /// Current working-memory contents, most-recently-pushed last.
    pub async fn working_memory(&self) -> Vec<MemoryNodeId> {
        self.state.lock().await.working_memory.iter().copied().collect()
    }

    /// Schedules an externally sourced event without advancing the
    /// cadence — used by the interface adapter (C10).
    pub async fn ingest(&self, event: CognitiveEvent) -> Result<(), crate::queue::QueueError> {
        self.queue.schedule(event).await
    }
}
