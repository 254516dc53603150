//! Repository trait for graph persistence
//!
//! The seam to the graph-database collaborator. Implementations must execute
//! fully parameterized queries (caller-supplied values are never spliced into
//! query text) and must provide atomic merge-on-id for
//! [`GraphRepository::merge_node`], which the upsert layer relies on to keep
//! at most one physical node per natural key under concurrent ingestions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

use super::edge::{EdgeKind, GraphEdge};
use super::node::{GraphNode, NodeLabel};

/// Repository trait for graph persistence
#[async_trait]
pub trait GraphRepository: Send + Sync {
    // ========== Node Operations ==========

    /// Insert the node unless one with the same id exists; return the stored
    /// node either way. This is the merge-on-key primitive behind tag/entity/
    /// link deduplication.
    async fn merge_node(&self, node: &GraphNode) -> Result<GraphNode>;

    /// Insert or fully replace a node
    async fn save_node(&self, node: &GraphNode) -> Result<()>;

    /// Get a node by id, scoped to its owner. Archived captures are
    /// retrievable here; archive filtering applies to listing and traversal
    /// only.
    async fn get_node(&self, owner_id: &str, id: &str) -> Result<Option<GraphNode>>;

    /// Delete a node and every edge touching it
    async fn delete_node(&self, owner_id: &str, id: &str) -> Result<bool>;

    /// Set the archived flag on a capture
    async fn set_archived(&self, owner_id: &str, id: &str, archived: bool) -> Result<bool>;

    /// Update a session's last-modified timestamp. No-op when the session
    /// does not exist.
    async fn touch_session(&self, owner_id: &str, session_id: &str, at: DateTime<Utc>)
    -> Result<()>;

    // ========== Edge Operations ==========

    /// Create a timestamped edge. Fails with `NotFound` unless both endpoints
    /// exist and belong to the edge's owner. Multiple edges of the same kind
    /// between the same pair are permitted.
    async fn create_edge(&self, edge: &GraphEdge) -> Result<()>;

    /// Delete edges of a kind between two nodes. No-op when absent.
    async fn delete_edge(
        &self,
        owner_id: &str,
        source_id: &str,
        target_id: &str,
        kind: EdgeKind,
    ) -> Result<()>;

    /// Delete all derived edges (`References`/`TaggedWith`/`LinksTo`)
    /// originating from a capture; returns the number removed.
    async fn delete_derived_edges(&self, owner_id: &str, capture_id: &str) -> Result<u64>;

    // ========== Traversal Operations ==========

    /// Nodes adjacent to any of `ids` (either edge direction), restricted to
    /// the given labels and to the owner. `exclude_archived` drops archived
    /// captures from the result.
    async fn neighbors(
        &self,
        owner_id: &str,
        ids: &[String],
        labels: &[NodeLabel],
        exclude_archived: bool,
    ) -> Result<Vec<GraphNode>>;

    /// All edges whose endpoints are both within `ids`, owner-scoped
    async fn edges_within(&self, owner_id: &str, ids: &[String]) -> Result<Vec<GraphEdge>>;

    // ========== Root Selection ==========

    /// Full-text search over capture plain text, ranked by relevance,
    /// paginated before expansion. Archived captures excluded.
    async fn search_captures(
        &self,
        owner_id: &str,
        query: &str,
        start: i64,
        count: i64,
    ) -> Result<Vec<GraphNode>>;

    /// Most recently created non-archived captures
    async fn recent_captures(&self, owner_id: &str, limit: i64) -> Result<Vec<GraphNode>>;

    /// Non-archived captures created strictly after `since`
    async fn captures_since(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<GraphNode>>;

    /// One uniformly sampled non-archived capture
    async fn random_capture(&self, owner_id: &str) -> Result<Option<GraphNode>>;
}
