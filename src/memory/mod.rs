//! C4 — Hypergraph Memory.
//!
//! A typed, directed multigraph augmented with hyperedges, indexed by
//! node type, creation time, and (where present) embedding. Readers are
//! many, writers are exclusive (`tokio::sync::RwLock`); a traversal
//! holds its read guard for the whole walk so it never observes a
//! concurrent mutation (§4.2).

pub mod traversal;

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use tokio::sync::RwLock;

use crate::core::types::{
    EdgeType, HyperEdge, HyperEdgeId, MemoryEdge, MemoryEdgeId, MemoryNode, MemoryNodeId, NodeType,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("node {0} already exists")]
    Duplicate(MemoryNodeId),
    #[error("edge endpoint missing")]
    MissingEndpoint,
    #[error("hyperedge member missing")]
    MissingMember,
}

/// The graph proper, guarded as a single unit by `Memory`'s lock.
#[derive(Debug, Default)]
pub struct GraphInner {
    nodes: HashMap<MemoryNodeId, MemoryNode>,
    edges: HashMap<MemoryEdgeId, MemoryEdge>,
    hyperedges: HashMap<HyperEdgeId, HyperEdge>,
    outgoing: HashMap<MemoryNodeId, Vec<MemoryEdgeId>>,
    incoming: HashMap<MemoryNodeId, Vec<MemoryEdgeId>>,
    by_type: HashMap<NodeType, Vec<MemoryNodeId>>,
    time_index: BTreeMap<(chrono::DateTime<chrono::Utc>, MemoryNodeId), ()>,
}

impl GraphInner {
    fn outgoing_edges(&self, node: MemoryNodeId, edge_types: &[EdgeType]) -> Vec<MemoryEdge> {
        self.outgoing
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|id| self.edges.get(id))
            .filter(|e| traversal::edge_matches_filter(e, edge_types))
            .cloned()
            .collect()
    }

    fn insert_node(&mut self, node: MemoryNode) {
        self.by_type.entry(node.node_type).or_default().push(node.id);
        self.time_index.insert((node.created_at, node.id), ());
        self.nodes.insert(node.id, node);
    }

    fn remove_node(&mut self, id: MemoryNodeId) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        if let Some(ids) = self.by_type.get_mut(&node.node_type) {
            ids.retain(|n| *n != id);
        }
        self.time_index.remove(&(node.created_at, id));

        for edge_id in self.outgoing.remove(&id).into_iter().flatten() {
            self.edges.remove(&edge_id);
        }
        for edge_id in self.incoming.remove(&id).into_iter().flatten() {
            self.edges.remove(&edge_id);
        }
        self.outgoing.values_mut().for_each(|v| {
            v.retain(|edge_id| self.edges.contains_key(edge_id));
        });
        self.incoming.values_mut().for_each(|v| {
            v.retain(|edge_id| self.edges.contains_key(edge_id));
        });
        self.hyperedges.retain(|_, he| !he.members.contains(&id));
    }
}

pub struct Memory {
    inner: RwLock<GraphInner>,
}

impl Memory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(GraphInner::default()),
        }
    }

    pub async fn add_node(&self, node: MemoryNode) -> Result<MemoryNodeId, MemoryError> {
        let mut graph = self.inner.write().await;
        if graph.nodes.contains_key(&node.id) {
            return Err(MemoryError::Duplicate(node.id));
        }
        let id = node.id;
        graph.insert_node(node);
        Ok(id)
    }

    pub async fn add_edge(&self, edge: MemoryEdge) -> Result<MemoryEdgeId, MemoryError> {
        let mut graph = self.inner.write().await;
        if !graph.nodes.contains_key(&edge.source) || !graph.nodes.contains_key(&edge.target) {
            return Err(MemoryError::MissingEndpoint);
        }
        let id = edge.id;
        graph.outgoing.entry(edge.source).or_default().push(id);
        graph.incoming.entry(edge.target).or_default().push(id);
        graph.edges.insert(id, edge);
        Ok(id)
    }

    pub async fn add_hyperedge(&self, hyperedge: HyperEdge) -> Result<HyperEdgeId, MemoryError> {
        let mut graph = self.inner.write().await;
        if hyperedge.members.iter().any(|m| !graph.nodes.contains_key(m)) {
            return Err(MemoryError::MissingMember);
        }
        let id = hyperedge.id;
        graph.hyperedges.insert(id, hyperedge);
        Ok(id)
    }

    pub async fn remove_node(&self, id: MemoryNodeId) {
        let mut graph = self.inner.write().await;
        graph.remove_node(id);
    }

    pub async fn get_node(&self, id: MemoryNodeId) -> Option<MemoryNode> {
        self.inner.read().await.nodes.get(&id).cloned()
    }

    pub async fn get_nodes_by_type(&self, node_type: NodeType) -> Vec<MemoryNode> {
        let graph = self.inner.read().await;
        graph
            .by_type
            .get(&node_type)
            .into_iter()
            .flatten()
            .filter_map(|id| graph.nodes.get(id))
            .cloned()
            .collect()
    }

    /// Most recently created nodes first, up to `limit` (use `usize::MAX`
    /// for "all").
    pub async fn get_recent(&self, limit: usize) -> Vec<MemoryNode> {
        let graph = self.inner.read().await;
        graph
            .time_index
            .keys()
            .rev()
            .take(limit)
            .filter_map(|(_, id)| graph.nodes.get(id))
            .cloned()
            .collect()
    }

    pub async fn traverse_bfs(
        &self,
        start: MemoryNodeId,
        max_depth: usize,
        edge_types: &[EdgeType],
    ) -> Vec<MemoryNodeId> {
        let graph = self.inner.read().await;
        if !graph.nodes.contains_key(&start) {
            return Vec::new();
        }
        traversal::bfs(&graph, start, max_depth, edge_types)
    }

    pub async fn traverse_dfs(
        &self,
        start: MemoryNodeId,
        max_depth: usize,
        edge_types: &[EdgeType],
    ) -> Vec<MemoryNodeId> {
        let graph = self.inner.read().await;
        if !graph.nodes.contains_key(&start) {
            return Vec::new();
        }
        traversal::dfs(&graph, start, max_depth, edge_types)
    }

    /// Unweighted BFS shortest path over outgoing edges. `None` when
    /// unreachable (`NoPath`, treated by callers as a non-error absent
    /// result per §7).
    pub async fn shortest_path(
        &self,
        start: MemoryNodeId,
        end: MemoryNodeId,
    ) -> Option<Vec<MemoryNodeId>> {
        let graph = self.inner.read().await;
        if !graph.nodes.contains_key(&start) || !graph.nodes.contains_key(&end) {
            return None;
        }
        traversal::shortest_path(&graph, start, end)
    }

    /// Cosine similarity over embeddings; `None` when `id` has no
    /// embedding (`NoEmbedding`, non-error absent result per §7).
    pub async fn find_similar(&self, id: MemoryNodeId, k: usize) -> Option<Vec<(MemoryNodeId, f32)>> {
        let graph = self.inner.read().await;
        let query = graph.nodes.get(&id)?.embedding.clone()?;

        let mut scored: Vec<(MemoryNodeId, f32)> = graph
            .nodes
            .values()
            .filter(|n| n.id != id)
            .filter_map(|n| {
                n.embedding
                    .as_ref()
                    .map(|v| (n.id, traversal::cosine_similarity(&query, v)))
            })
            .collect();

        // Descending similarity, deterministic id tie-break.
        scored.sort_by(|a, b| match b.1.partial_cmp(&a.1) {
            Some(std::cmp::Ordering::Equal) | None => a.0.cmp(&b.0),
            Some(ord) => ord,
        });
        scored.truncate(k);
        Some(scored)
    }

    pub async fn node_count(&self) -> usize {
        self.inner.read().await.nodes.len()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::NodeType;

    fn node(node_type: NodeType) -> MemoryNode {
        MemoryNode::new(node_type, serde_json::json!("x"))
    }

    #[tokio::test]
    async fn add_node_then_get_nodes_by_type_and_recent() {
        let memory = Memory::new();
        let n = node(NodeType::Concept);
        let id = n.id;
        memory.add_node(n).await.unwrap();

        let by_type = memory.get_nodes_by_type(NodeType::Concept).await;
        assert!(by_type.iter().any(|n| n.id == id));

        let recent = memory.get_recent(usize::MAX).await;
        assert!(recent.iter().any(|n| n.id == id));
    }

    #[tokio::test]
    async fn add_node_rejects_duplicate_id() {
        let memory = Memory::new();
        let n = node(NodeType::Concept);
        let dup = n.clone();
        let id = n.id;
        memory.add_node(n).await.unwrap();
        assert_eq!(memory.add_node(dup).await, Err(MemoryError::Duplicate(id)));
    }

    #[tokio::test]
    async fn add_edge_fails_on_missing_endpoint() {
        let memory = Memory::new();
        let a = node(NodeType::Concept);
        let a_id = a.id;
        memory.add_node(a).await.unwrap();
        let edge = MemoryEdge::new(a_id, MemoryNodeId::new(), crate::core::types::EdgeType::Associates, 0.5);
        assert_eq!(memory.add_edge(edge).await, Err(MemoryError::MissingEndpoint));
    }

    #[tokio::test]
    async fn removing_node_removes_incident_edges() {
        let memory = Memory::new();
        let a = node(NodeType::Concept);
        let b = node(NodeType::Concept);
        let (a_id, b_id) = (a.id, b.id);
        memory.add_node(a).await.unwrap();
        memory.add_node(b).await.unwrap();
        let edge = MemoryEdge::new(a_id, b_id, crate::core::types::EdgeType::Associates, 0.5);
        let edge_id = memory.add_edge(edge).await.unwrap();

        memory.remove_node(a_id).await;
        let graph = memory.inner.read().await;
        assert!(!graph.edges.contains_key(&edge_id));
    }

    #[tokio::test]
    async fn bfs_respects_edge_type_filter_and_max_depth() {
        let memory = Memory::new();
        let a = node(NodeType::Concept);
        let b = node(NodeType::Concept);
        let c = node(NodeType::Concept);
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);
        memory.add_node(a).await.unwrap();
        memory.add_node(b).await.unwrap();
        memory.add_node(c).await.unwrap();
        memory
            .add_edge(MemoryEdge::new(a_id, b_id, crate::core::types::EdgeType::Causes, 1.0))
            .await
            .unwrap();
        memory
            .add_edge(MemoryEdge::new(b_id, c_id, crate::core::types::EdgeType::Similar, 1.0))
            .await
            .unwrap();

        let visited = memory
            .traverse_bfs(a_id, 5, &[crate::core::types::EdgeType::Causes])
            .await;
        assert_eq!(visited, vec![a_id, b_id]);
    }

    #[tokio::test]
    async fn shortest_path_returns_none_when_unreachable() {
        let memory = Memory::new();
        let a = node(NodeType::Concept);
        let b = node(NodeType::Concept);
        let (a_id, b_id) = (a.id, b.id);
        memory.add_node(a).await.unwrap();
        memory.add_node(b).await.unwrap();
        assert_eq!(memory.shortest_path(a_id, b_id).await, None);
    }

    #[tokio::test]
    async fn find_similar_none_without_embedding() {
        let memory = Memory::new();
        let a = node(NodeType::Concept);
        let id = a.id;
        memory.add_node(a).await.unwrap();
        assert_eq!(memory.find_similar(id, 3).await, None);
    }

    #[tokio::test]
    async fn find_similar_orders_by_descending_similarity() {
        let memory = Memory::new();
        let query = node(NodeType::Concept).with_embedding(vec![1.0, 0.0]);
        let close = node(NodeType::Concept).with_embedding(vec![0.9, 0.1]);
        let far = node(NodeType::Concept).with_embedding(vec![0.0, 1.0]);
        let (qid, close_id, far_id) = (query.id, close.id, far.id);
        memory.add_node(query).await.unwrap();
        memory.add_node(close).await.unwrap();
        memory.add_node(far).await.unwrap();

        let results = memory.find_similar(qid, 2).await.unwrap();
        assert_eq!(results[0].0, close_id);
        assert_eq!(results[1].0, far_id);
    }
}
