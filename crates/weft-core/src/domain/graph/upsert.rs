//! Merge-on-key node creation for Tag, Entity and Link nodes
//!
//! Classifier nodes are never duplicated for the same owner and normalized
//! key: the natural key is the node id, and [`GraphRepository::merge_node`]
//! resolves races atomically. Entity salience is deliberately absent here; it
//! belongs to the `References` edge because it varies per capture.

use std::sync::Arc;

use crate::domain::auth::AuthenticatedUser;
use crate::error::{Error, Result};

use super::node::{Entity, EntityCategory, GraphNode, KnowledgeMetadata, Link, Tag};
use super::repository::GraphRepository;

/// Idempotent create-or-reuse for classifier nodes
pub struct NodeUpserter<R> {
    repository: Arc<R>,
}

impl<R> Clone for NodeUpserter<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: GraphRepository> NodeUpserter<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub async fn upsert_tag(&self, owner: &AuthenticatedUser, text: &str) -> Result<Tag> {
        let tag = Tag::new(&owner.id, text);
        match self.repository.merge_node(&GraphNode::Tag(tag)).await? {
            GraphNode::Tag(stored) => Ok(stored),
            other => Err(Error::Other(format!(
                "Tag key collided with a {} node: {}",
                other.label(),
                other.id()
            ))),
        }
    }

    pub async fn upsert_entity(
        &self,
        owner: &AuthenticatedUser,
        name: &str,
        category: EntityCategory,
        metadata: Option<KnowledgeMetadata>,
    ) -> Result<Entity> {
        let entity = Entity::new(&owner.id, name, category, metadata);
        match self.repository.merge_node(&GraphNode::Entity(entity)).await? {
            GraphNode::Entity(stored) => Ok(stored),
            other => Err(Error::Other(format!(
                "Entity key collided with a {} node: {}",
                other.label(),
                other.id()
            ))),
        }
    }

    pub async fn upsert_link(&self, owner: &AuthenticatedUser, url: &str) -> Result<Link> {
        let link = Link::new(&owner.id, url);
        match self.repository.merge_node(&GraphNode::Link(link)).await? {
            GraphNode::Link(stored) => Ok(stored),
            other => Err(Error::Other(format!(
                "Link key collided with a {} node: {}",
                other.label(),
                other.id()
            ))),
        }
    }
}
