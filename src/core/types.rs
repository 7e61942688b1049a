//! The shared data model: `CognitiveEvent`, `MemoryNode`, `MemoryEdge`,
//! `HyperEdge`, `CognitiveState`, `LifecycleState`, `PersistentSnapshot`.
//!
//! Ownership is split across components (see module docs at each
//! component boundary); this module only defines the shapes and the
//! invariants each constructor enforces.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Working memory holds at most this many recent thoughts.
pub const WORKING_MEMORY_CAPACITY: usize = 7;
/// The persisted recent-thoughts ring never grows past this size.
pub const RECENT_THOUGHTS_CAPACITY: usize = 256;
/// Current on-disk schema version; `Load` refuses anything newer.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("due-at {due_at} precedes created-at {created_at}")]
    DueBeforeCreated {
        created_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
    },
    #[error("recurring event must carry a positive interval")]
    RecurringWithoutInterval,
    #[error("hyperedge must have at least 2 members, got {0}")]
    HyperEdgeTooSmall(usize),
}

fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(EventId);
uuid_id!(MemoryNodeId);
uuid_id!(MemoryEdgeId);
uuid_id!(HyperEdgeId);

/// The kinds of events C2 can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Thought,
    Perception,
    Action,
    Learning,
    MemoryConsolidation,
    GoalPursuit,
    SocialInteraction,
    Introspection,
    Dream,
    Wake,
    Rest,
}

/// A scheduled cognitive event. Higher `priority` is served first; among
/// equal priorities, earlier `due_at` wins; among equal due times, the
/// lower `id` wins (deterministic tie-break, see `crate::queue`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CognitiveEvent {
    pub id: EventId,
    pub kind: EventKind,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub context: std::collections::HashMap<String, serde_json::Value>,
    pub recurring: bool,
    pub interval: Option<Duration>,
}

impl CognitiveEvent {
    /// Builds an immediate, non-recurring event due now.
    #[must_use]
    pub fn new(kind: EventKind, priority: i32, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: EventId::new(),
            kind,
            priority,
            created_at: now,
            due_at: now,
            payload,
            context: std::collections::HashMap::new(),
            recurring: false,
            interval: None,
        }
    }

    #[must_use]
    pub fn due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = due_at;
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn recurring_every(mut self, interval: Duration) -> Self {
        self.recurring = true;
        self.interval = Some(interval);
        self
    }

    /// Validates the invariants from the data model: `due_at >= created_at`,
    /// and `recurring` implies a positive `interval`.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.due_at < self.created_at {
            return Err(CoreError::DueBeforeCreated {
                created_at: self.created_at,
                due_at: self.due_at,
            });
        }
        if self.recurring {
            match self.interval {
                Some(d) if d > Duration::ZERO => {}
                _ => return Err(CoreError::RecurringWithoutInterval),
            }
        }
        Ok(())
    }

    /// Produces the next instance of a recurring event, due `interval`
    /// after `now`, carrying a freshly assigned id (same id-family, a new
    /// identity is acceptable per the queue contract).
    #[must_use]
    pub fn next_occurrence(&self, now: DateTime<Utc>) -> Option<Self> {
        let interval = self.interval?;
        let mut next = self.clone();
        next.id = EventId::new();
        next.created_at = now;
        next.due_at = now + chrono::Duration::from_std(interval).unwrap_or_default();
        Some(next)
    }
}

/// The kinds of nodes the hypergraph stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Concept,
    Episode,
    Skill,
    Goal,
    Interest,
    Pattern,
    Thought,
    Insight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNode {
    pub id: MemoryNodeId,
    pub node_type: NodeType,
    pub content: serde_json::Value,
    pub importance: f32,
    pub salience: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub embedding: Option<Vec<f32>>,
}

impl MemoryNode {
    #[must_use]
    pub fn new(node_type: NodeType, content: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: MemoryNodeId::new(),
            node_type,
            content,
            importance: 0.0,
            salience: 0.0,
            created_at: now,
            updated_at: now,
            embedding: None,
        }
    }

    #[must_use]
    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = clamp01(importance);
        self
    }

    #[must_use]
    pub fn with_salience(mut self, salience: f32) -> Self {
        self.salience = clamp01(salience);
        self
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Directed, typed multigraph edge between two memory nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Associates,
    Causes,
    Precedes,
    Contains,
    Similar,
    Contradicts,
    Supports,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEdge {
    pub id: MemoryEdgeId,
    pub source: MemoryNodeId,
    pub target: MemoryNodeId,
    pub edge_type: EdgeType,
    pub weight: f32,
    pub created_at: DateTime<Utc>,
}

impl MemoryEdge {
    #[must_use]
    pub fn new(source: MemoryNodeId, target: MemoryNodeId, edge_type: EdgeType, weight: f32) -> Self {
        Self {
            id: MemoryEdgeId::new(),
            source,
            target,
            edge_type,
            weight: clamp01(weight),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperEdge {
    pub id: HyperEdgeId,
    pub members: Vec<MemoryNodeId>,
    pub semantic_type: String,
    pub created_at: DateTime<Utc>,
}

impl HyperEdge {
    pub fn new(members: Vec<MemoryNodeId>, semantic_type: impl Into<String>) -> Result<Self, CoreError> {
        if members.len() < 2 {
            return Err(CoreError::HyperEdgeTooSmall(members.len()));
        }
        Ok(Self {
            id: HyperEdgeId::new(),
            members,
            semantic_type: semantic_type.into(),
            created_at: Utc::now(),
        })
    }
}

/// The acting phase within a step: past/present/future orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Affordance,
    Relevance,
    Salience,
}

/// Action-oriented vs. simulation-oriented step mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Expressive,
    Reflective,
}

/// C8's exclusively-owned per-cycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CognitiveState {
    pub step_index: u8,
    pub cycle_count: u64,
    pub mode: Mode,
    pub phase: Phase,
    pub working_memory: VecDeque<MemoryNodeId>,
    pub insights: Vec<MemoryNodeId>,
    pub cognitive_load: f32,
}

impl CognitiveState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            step_index: 1,
            cycle_count: 0,
            mode: Mode::Expressive,
            phase: Phase::Relevance,
            working_memory: VecDeque::with_capacity(WORKING_MEMORY_CAPACITY),
            insights: Vec::new(),
            cognitive_load: 0.0,
        }
    }

    /// Pushes into working memory, dropping the oldest entry once at
    /// capacity (§8 boundary behavior).
    pub fn push_working_memory(&mut self, id: MemoryNodeId) {
        if self.working_memory.len() >= WORKING_MEMORY_CAPACITY {
            self.working_memory.pop_front();
        }
        self.working_memory.push_back(id);
    }

    pub fn push_insight(&mut self, id: MemoryNodeId) {
        self.insights.push(id);
    }

    /// Clears the cycle-scoped insights list; called at cycle boundary.
    pub fn clear_insights(&mut self) -> Vec<MemoryNodeId> {
        std::mem::take(&mut self.insights)
    }

    pub fn set_cognitive_load(&mut self, load: f32) {
        self.cognitive_load = clamp01(load);
    }
}

impl Default for CognitiveState {
    fn default() -> Self {
        Self::new()
    }
}

/// The three lifecycle states C6 transitions between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleMode {
    Awake,
    Resting,
    Dreaming,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleState {
    pub mode: LifecycleMode,
    pub entered_at: DateTime<Utc>,
    pub fatigue: f32,
    pub last_dream_at: Option<DateTime<Utc>>,
}

impl LifecycleState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: LifecycleMode::Awake,
            entered_at: Utc::now(),
            fatigue: 0.0,
            last_dream_at: None,
        }
    }

    pub fn transition_to(&mut self, mode: LifecycleMode, now: DateTime<Utc>) {
        self.mode = mode;
        self.entered_at = now;
        if mode == LifecycleMode::Dreaming {
            self.last_dream_at = Some(now);
        }
    }

    pub fn set_fatigue(&mut self, fatigue: f32) {
        self.fatigue = clamp01(fatigue);
    }
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::new()
    }
}

/// Seven named dimensions, each clamped to `[0,1]`. Nothing in the core
/// updates these automatically; they are a stable slot for an external
/// self-assessment pass to write into and for snapshots to carry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wisdom {
    pub curiosity: f32,
    pub empathy: f32,
    pub patience: f32,
    pub discernment: f32,
    pub resilience: f32,
    pub creativity: f32,
    pub equanimity: f32,
}

impl Wisdom {
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            curiosity: 0.0,
            empathy: 0.0,
            patience: 0.0,
            discernment: 0.0,
            resilience: 0.0,
            creativity: 0.0,
            equanimity: 0.0,
        }
    }

    /// Clamps every dimension to `[0,1]`.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            curiosity: clamp01(self.curiosity),
            empathy: clamp01(self.empathy),
            patience: clamp01(self.patience),
            discernment: clamp01(self.discernment),
            resilience: clamp01(self.resilience),
            creativity: clamp01(self.creativity),
            equanimity: clamp01(self.equanimity),
        }
    }
}

impl Default for Wisdom {
    fn default() -> Self {
        Self::neutral()
    }
}

/// A single entry in the persisted recent-thoughts ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentThought {
    pub id: MemoryNodeId,
    pub content: serde_json::Value,
    pub kind: NodeType,
    pub importance: f32,
    pub timestamp: DateTime<Utc>,
}

/// The durable snapshot C5 saves and loads. Counters are monotonic
/// across reloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentSnapshot {
    pub identity_name: String,
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub cycle_count: u64,
    pub total_thoughts: u64,
    pub total_insights: u64,
    pub lifecycle_mode: LifecycleMode,
    pub fatigue: f32,
    pub last_dream_at: Option<DateTime<Utc>>,
    pub last_wake_duration: Duration,
    pub last_rest_duration: Duration,
    pub recent_thoughts: VecDeque<RecentThought>,
    pub wisdom: Wisdom,
    pub schema_version: u32,
}

impl PersistentSnapshot {
    #[must_use]
    pub fn empty(identity_name: impl Into<String>) -> Self {
        Self {
            identity_name: identity_name.into(),
            session_id: Uuid::new_v4(),
            created_at: Utc::now(),
            cycle_count: 0,
            total_thoughts: 0,
            total_insights: 0,
            lifecycle_mode: LifecycleMode::Awake,
            fatigue: 0.0,
            last_dream_at: None,
            last_wake_duration: Duration::ZERO,
            last_rest_duration: Duration::ZERO,
            recent_thoughts: VecDeque::new(),
            wisdom: Wisdom::neutral(),
            schema_version: SCHEMA_VERSION,
        }
    }

    pub fn push_recent_thought(&mut self, thought: RecentThought) {
        if self.recent_thoughts.len() >= RECENT_THOUGHTS_CAPACITY {
            self.recent_thoughts.pop_front();
        }
        self.recent_thoughts.push_back(thought);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_are_unique() {
        let a = EventId::new();
        let b = EventId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn event_validate_rejects_due_before_created() {
        let mut event = CognitiveEvent::new(EventKind::Thought, 0, serde_json::Value::Null);
        event.due_at = event.created_at - chrono::Duration::seconds(1);
        assert!(matches!(
            event.validate(),
            Err(CoreError::DueBeforeCreated { .. })
        ));
    }

    #[test]
    fn event_validate_rejects_recurring_without_interval() {
        let mut event = CognitiveEvent::new(EventKind::Thought, 0, serde_json::Value::Null);
        event.recurring = true;
        event.interval = None;
        assert_eq!(event.validate(), Err(CoreError::RecurringWithoutInterval));
    }

    #[test]
    fn recurring_every_sets_next_occurrence_due_time() {
        let event = CognitiveEvent::new(EventKind::Thought, 0, serde_json::Value::Null)
            .recurring_every(Duration::from_secs(5));
        let now = Utc::now();
        let next = event.next_occurrence(now).expect("recurring has interval");
        assert_eq!(next.due_at, now + chrono::Duration::seconds(5));
        assert_ne!(next.id, event.id);
    }

    #[test]
    fn memory_node_clamps_importance_and_salience() {
        let node = MemoryNode::new(NodeType::Thought, serde_json::json!("hi"))
            .with_importance(1.5)
            .with_salience(-0.3);
        assert_eq!(node.importance, 1.0);
        assert_eq!(node.salience, 0.0);
    }

    #[test]
    fn hyperedge_rejects_fewer_than_two_members() {
        let one = vec![MemoryNodeId::new()];
        assert_eq!(
            HyperEdge::new(one, "cluster").unwrap_err(),
            CoreError::HyperEdgeTooSmall(1)
        );
        let two = vec![MemoryNodeId::new(), MemoryNodeId::new()];
        assert!(HyperEdge::new(two, "cluster").is_ok());
    }

    #[test]
    fn working_memory_drops_oldest_at_capacity() {
        let mut state = CognitiveState::new();
        let mut ids = Vec::new();
        for _ in 0..WORKING_MEMORY_CAPACITY + 2 {
            let id = MemoryNodeId::new();
            ids.push(id);
            state.push_working_memory(id);
        }
        assert_eq!(state.working_memory.len(), WORKING_MEMORY_CAPACITY);
        assert_eq!(state.working_memory.front().copied(), Some(ids[2]));
    }

    #[test]
    fn clear_insights_empties_and_returns() {
        let mut state = CognitiveState::new();
        state.push_insight(MemoryNodeId::new());
        state.push_insight(MemoryNodeId::new());
        let cleared = state.clear_insights();
        assert_eq!(cleared.len(), 2);
        assert!(state.insights.is_empty());
    }

    #[test]
    fn lifecycle_transition_records_dream_time() {
        let mut lifecycle = LifecycleState::new();
        let now = Utc::now();
        lifecycle.transition_to(LifecycleMode::Dreaming, now);
        assert_eq!(lifecycle.mode, LifecycleMode::Dreaming);
        assert_eq!(lifecycle.last_dream_at, Some(now));
    }

    #[test]
    fn wisdom_clamps_all_dimensions() {
        let wisdom = Wisdom {
            curiosity: 2.0,
            empathy: -1.0,
            patience: 0.5,
            discernment: 0.5,
            resilience: 0.5,
            creativity: 0.5,
            equanimity: 0.5,
        }
        .clamped();
        assert_eq!(wisdom.curiosity, 1.0);
        assert_eq!(wisdom.empathy, 0.0);
    }

    #[test]
    fn snapshot_recent_thoughts_ring_is_bounded() {
        let mut snapshot = PersistentSnapshot::empty("test");
        for i in 0..RECENT_THOUGHTS_CAPACITY + 10 {
            snapshot.push_recent_thought(RecentThought {
                id: MemoryNodeId::new(),
                content: serde_json::json!(i),
                kind: NodeType::Thought,
                importance: 0.5,
                timestamp: Utc::now(),
            });
        }
        assert_eq!(snapshot.recent_thoughts.len(), RECENT_THOUGHTS_CAPACITY);
    }
}
