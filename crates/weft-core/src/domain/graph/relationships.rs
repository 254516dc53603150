//! Relationship creation and deletion between owned nodes
//!
//! Creation fails with `NotFound` unless both endpoints exist and belong to
//! the requesting user; deletion of an absent relationship is a no-op. Node
//! identity is deduplicated at the upsert layer, relationship identity is
//! not: a second edge of the same kind between the same pair is permitted.

use std::sync::Arc;

use tracing::debug;

use crate::domain::auth::AuthenticatedUser;
use crate::error::Result;

use super::edge::{EdgeKind, GraphEdge};
use super::repository::GraphRepository;

pub struct RelationshipService<R> {
    repository: Arc<R>,
}

impl<R> Clone for RelationshipService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: GraphRepository> RelationshipService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Create a timestamped edge owned by `owner`
    pub async fn create(
        &self,
        owner: &AuthenticatedUser,
        source_id: &str,
        target_id: &str,
        kind: EdgeKind,
        salience: Option<f32>,
    ) -> Result<GraphEdge> {
        let mut edge = GraphEdge::new(&owner.id, source_id, target_id, kind);
        if let Some(salience) = salience {
            edge = edge.with_salience(salience);
        }
        self.repository.create_edge(&edge).await?;
        debug!(source = source_id, target = target_id, kind = %kind, "Relationship created");
        Ok(edge)
    }

    /// Delete edges of `kind` between the pair; absent edges are not an error
    pub async fn delete(
        &self,
        owner: &AuthenticatedUser,
        source_id: &str,
        target_id: &str,
        kind: EdgeKind,
    ) -> Result<()> {
        self.repository
            .delete_edge(&owner.id, source_id, target_id, kind)
            .await?;
        debug!(source = source_id, target = target_id, kind = %kind, "Relationship deleted");
        Ok(())
    }
}
