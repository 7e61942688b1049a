//! Core data model and time source shared across every component.
//!
//! `types` defines the entities C1..C10 operate over (`CognitiveEvent`,
//! `MemoryNode`, `MemoryEdge`, `HyperEdge`, `CognitiveState`, `LifecycleState`,
//! `PersistentSnapshot`). `clock` is the monotonic tick source (C1).

pub mod clock;
pub mod cognitive_loop;
pub mod types;

pub use clock::{Clock, TickSource};
pub use types::{
    CognitiveEvent, CognitiveState, EdgeType, EventId, EventKind, HyperEdge, HyperEdgeId,
    LifecycleMode, LifecycleState, MemoryEdge, MemoryNode, MemoryNodeId, Mode, NodeType,
    PersistentSnapshot, Phase, Wisdom,
};
