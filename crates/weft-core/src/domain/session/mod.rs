//! Session lifecycle
//!
//! Sessions group captures taken in one sitting. Creation mirrors capture
//! creation minus derivation: merge the owner, persist the node, record the
//! ownership edge. `last_modified` advances only through the ingestion
//! pipeline touching the parent session.

use std::sync::Arc;

use tracing::info;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::graph::edge::EdgeKind;
use crate::domain::graph::node::{GraphNode, Session, User};
use crate::domain::graph::relationships::RelationshipService;
use crate::domain::graph::repository::GraphRepository;
use crate::error::{Error, Result};

pub struct SessionService<R> {
    repository: Arc<R>,
    relationships: RelationshipService<R>,
}

impl<R: GraphRepository> SessionService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            relationships: RelationshipService::new(Arc::clone(&repository)),
            repository,
        }
    }

    pub async fn create_session(
        &self,
        user: &AuthenticatedUser,
        title: &str,
    ) -> Result<Session> {
        if title.trim().is_empty() {
            return Err(Error::Validation("session title must not be empty".into()));
        }

        self.repository
            .merge_node(&GraphNode::User(User::from_identity(user)))
            .await?;

        let session = Session::new(&user.id, title.trim());
        self.repository
            .save_node(&GraphNode::Session(session.clone()))
            .await?;
        self.relationships
            .create(user, &user.id, &session.id, EdgeKind::Created, None)
            .await?;

        info!(session_id = %session.id, "Session created");
        Ok(session)
    }
}
