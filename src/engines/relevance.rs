//! Relevance engine — present/orienting.
//!
//! Computes what currently matters by weighting interests, goals, and
//! incoming context, then writes focus and attention allocation into
//! state. Runs on steps 1 and 7 — the pivotal relevance realizations,
//! the only points where focus may be re-oriented mid-cycle (§4.5).

use async_trait::async_trait;

use crate::core::types::NodeType;

use super::{Engine, EngineError, StepContext, StepResult};

pub struct RelevanceEngine;

impl RelevanceEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for RelevanceEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Engine for RelevanceEngine {
    fn phase(&self) -> crate::core::types::Phase {
        crate::core::types::Phase::Relevance
    }

    async fn process(&self, ctx: &StepContext) -> Result<StepResult, EngineError> {
        let interests = ctx.memory.get_nodes_by_type(NodeType::Interest).await;
        let goals = ctx.memory.get_nodes_by_type(NodeType::Goal).await;

        let mut candidates: Vec<_> = interests.iter().chain(goals.iter()).collect();
        candidates.sort_by(|a, b| b.salience.partial_cmp(&a.salience).unwrap_or(std::cmp::Ordering::Equal));

        let focus = candidates.first().map(|n| n.id);
        let load = candidates
            .iter()
            .map(|n| n.salience)
            .fold(0.0_f32, f32::max);

        let mut result = StepResult::empty(serde_json::json!({
            "phase": "relevance",
            "focus": focus.map(|f| f.to_string()),
            "interests_considered": interests.len(),
            "goals_considered": goals.len(),
        }));

        result.patch.refocus = focus;
        result.patch.cognitive_load = Some(load);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::provider::FallbackChain;
    use crate::engines::{StateSnapshot, StepContext};
    use crate::memory::Memory;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn ctx(memory: Arc<Memory>) -> StepContext {
        StepContext {
            step: 1,
            phase: crate::core::types::Phase::Relevance,
            mode: crate::core::types::Mode::Expressive,
            cycle_count: 0,
            previous_outputs: HashMap::new(),
            snapshot: StateSnapshot {
                state: crate::core::types::CognitiveState::new(),
                working_memory_nodes: Vec::new(),
            },
            memory,
            provider: Arc::new(FallbackChain::fallback_only(Duration::from_millis(50))),
        }
    }

    #[tokio::test]
    async fn refocuses_on_most_salient_goal_or_interest() {
        let memory = Arc::new(Memory::new());
        let minor = crate::core::types::MemoryNode::new(NodeType::Interest, serde_json::json!("minor"))
            .with_salience(0.1);
        let major = crate::core::types::MemoryNode::new(NodeType::Goal, serde_json::json!("major"))
            .with_salience(0.95);
        let major_id = major.id;
        memory.add_node(minor).await.unwrap();
        memory.add_node(major).await.unwrap();

        let engine = RelevanceEngine::new();
        let result = engine.process(&ctx(memory)).await.unwrap();
        assert_eq!(result.patch.refocus, Some(major_id));
        assert_eq!(result.patch.cognitive_load, Some(0.95));
    }

    #[tokio::test]
    async fn no_candidates_leaves_focus_unset() {
        let memory = Arc::new(Memory::new());
        let engine = RelevanceEngine::new();
        let result = engine.process(&ctx(memory)).await.unwrap();
        assert_eq!(result.patch.refocus, None);
    }
}
