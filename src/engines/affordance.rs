//! Affordance engine — past/conditioning.
//!
//! Ingests recent episodes and skills and proposes candidate actions
//! with updated utilities. Runs on steps 2–6 (§4.5).

use async_trait::async_trait;

use crate::core::types::NodeType;

use super::{Engine, EngineError, StepContext, StepResult};

pub struct AffordanceEngine;

impl AffordanceEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for AffordanceEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Engine for AffordanceEngine {
    fn phase(&self) -> crate::core::types::Phase {
        crate::core::types::Phase::Affordance
    }

    async fn process(&self, ctx: &StepContext) -> Result<StepResult, EngineError> {
        let episodes = ctx.memory.get_nodes_by_type(NodeType::Episode).await;
        let skills = ctx.memory.get_nodes_by_type(NodeType::Skill).await;

        // Utility is a simple recency/importance blend: the source
        // material (episodes, skills) is conditioning, not a live signal,
        // so no provider call is needed for this phase.
        let mut candidates: Vec<_> = episodes.iter().chain(skills.iter()).collect();
        candidates.sort_by(|a, b| b.importance.partial_cmp(&a.importance).unwrap_or(std::cmp::Ordering::Equal));

        let proposals: Vec<serde_json::Value> = candidates
            .iter()
            .take(3)
            .map(|n| {
                serde_json::json!({
                    "node_id": n.id.to_string(),
                    "node_type": format!("{:?}", n.node_type),
                    "utility": n.importance,
                })
            })
            .collect();

        let mut result = StepResult::empty(serde_json::json!({
            "phase": "affordance",
            "candidates_considered": candidates.len(),
            "proposals": proposals,
        }));

        if let Some(top) = candidates.first() {
            result.patch.push_working_memory = Some(top.id);
        }

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
            step: 2,
            phase: crate::core::types::Phase::Affordance,
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
    async fn proposes_candidates_ranked_by_importance() {
        let memory = Arc::new(Memory::new());
        let low = crate::core::types::MemoryNode::new(NodeType::Episode, serde_json::json!("low"))
            .with_importance(0.2);
        let high = crate::core::types::MemoryNode::new(NodeType::Episode, serde_json::json!("high"))
            .with_importance(0.9);
        let high_id = high.id;
        memory.add_node(low).await.unwrap();
        memory.add_node(high).await.unwrap();

        let engine = AffordanceEngine::new();
        let result = engine.process(&ctx(memory)).await.unwrap();
        assert_eq!(result.patch.push_working_memory, Some(high_id));
    }
}
