//! Salience engine — future/anticipating.
//!
//! Simulates candidate futures, assigns desirability and probability,
//! and selects an optimal path. Runs on steps 8–12, in Reflective mode
//! (§4.5). This is the engine most likely to need generative text, so
//! it is the one that calls through C3's fallback chain.

use async_trait::async_trait;

use crate::core::types::NodeType;
use crate::engines::provider::GenerateOptions;

use super::{Engine, EngineError, StepContext, StepResult};

pub struct SalienceEngine;

impl SalienceEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for SalienceEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Engine for SalienceEngine {
    fn phase(&self) -> crate::core::types::Phase {
        crate::core::types::Phase::Salience
    }

    async fn process(&self, ctx: &StepContext) -> Result<StepResult, EngineError> {
        let goals = ctx.memory.get_nodes_by_type(NodeType::Goal).await;
        let focus_summary = goals
            .iter()
            .map(|g| g.content.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        let prompt = format!(
            "step {} / cycle {}: given goals [{}], simulate the most desirable next future",
            ctx.step, ctx.cycle_count, focus_summary
        );

        let (simulation, degraded) = ctx
            .provider
            .generate(&prompt, &GenerateOptions::default())
            .await;

        // Desirability/probability are a simple deterministic function of
        // goal importance so the same inputs always yield the same
        // selected path (consolidation in C9 depends on this determinism).
        let mut candidates: Vec<_> = goals.iter().collect();
        candidates.sort_by(|a, b| b.importance.partial_cmp(&a.importance).unwrap_or(std::cmp::Ordering::Equal));
        let selected = candidates.first().map(|g| g.id);

        let mut result = StepResult::empty(serde_json::json!({
            "phase": "salience",
            "simulation": simulation,
            "selected_path": selected.map(|s| s.to_string()),
            "degraded": degraded,
        }));
        result.degraded = degraded;
        result.patch.push_insight = selected;
        Ok(result)
    }
}
