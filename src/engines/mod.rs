//! C7 — Cognitive Engine Trio, and the C3 provider port they share.
//!
//! Each engine is a pure consumer of a [`StepContext`] and a producer of
//! a [`StepResult`]: it never mutates the queue or memory directly, it
//! only returns events and a state patch for C8 to apply (§4.4, §9 —
//! "engines hold only immutable views into state and return effects").

pub mod affordance;
pub mod provider;
pub mod relevance;
pub mod salience;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::types::{CognitiveEvent, CognitiveState, MemoryNodeId, Mode, Phase};
use crate::memory::Memory;
use provider::FallbackChain;

pub use affordance::AffordanceEngine;
pub use relevance::RelevanceEngine;
pub use salience::SalienceEngine;

#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("engine {engine} failed: {reason}")]
    Failed { engine: String, reason: String },
}

/// An immutable view of shared state taken at step start (§4.5 —
/// "engines observe state through immutable snapshots").
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub state: CognitiveState,
    pub working_memory_nodes: Vec<MemoryNodeId>,
}

/// Everything an engine needs to process one step.
#[derive(Clone)]
pub struct StepContext {
    pub step: u8,
    pub phase: Phase,
    pub mode: Mode,
    pub cycle_count: u64,
    pub previous_outputs: HashMap<u8, serde_json::Value>,
    pub snapshot: StateSnapshot,
    pub memory: Arc<Memory>,
    pub provider: Arc<FallbackChain>,
}

/// A proposed, not-yet-applied mutation to `CognitiveState`, applied by
/// C8 after the engine returns (engines never touch state directly).
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub push_working_memory: Option<MemoryNodeId>,
    pub push_insight: Option<MemoryNodeId>,
    pub cognitive_load: Option<f32>,
    pub refocus: Option<MemoryNodeId>,
}

#[derive(Debug, Clone)]
pub struct StepResult {
    pub output: serde_json::Value,
    pub events: Vec<CognitiveEvent>,
    pub patch: StatePatch,
    pub degraded: bool,
}

impl StepResult {
    #[must_use]
    pub fn empty(output: serde_json::Value) -> Self {
        Self {
            output,
            events: Vec::new(),
            patch: StatePatch::default(),
            degraded: false,
        }
    }
}

/// The seam the three engines (Affordance, Relevance, Salience) share.
#[async_trait]
pub trait Engine: Send + Sync {
    fn phase(&self) -> Phase;
    async fn process(&self, ctx: &StepContext) -> Result<StepResult, EngineError>;
}
