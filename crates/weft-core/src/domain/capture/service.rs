//! Capture ingestion pipeline
//!
//! Orchestrates parsing, entity extraction, node upserts and relationship
//! creation on capture create/edit. Per call:
//!
//! 1. Normalize the body to plain text.
//! 2. Persist the capture node (on edit, delete all derived edges first —
//!    edits are regenerated wholesale, never diffed).
//! 3. Fan out concurrently: touch the parent session, create the `Previous`
//!    edge, and derive tag/entity/link relationships.
//! 4. Join. Extraction failure is tolerated (zero entities); any other
//!    failure fails the create/edit.
//!
//! `Previous` and `DismissedRelation` edges are user intent and survive
//! edits; they are not part of the regenerated set.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::auth::AuthenticatedUser;
use crate::domain::expansion::{ExpansionService, Graph};
use crate::domain::extraction::ExtractionGateway;
use crate::domain::graph::edge::EdgeKind;
use crate::domain::graph::node::{Capture, GraphNode, NodeLabel, User};
use crate::domain::graph::relationships::RelationshipService;
use crate::domain::graph::repository::GraphRepository;
use crate::domain::graph::upsert::NodeUpserter;
use crate::error::{Error, Result};

use super::html::HtmlToText;
use super::parser::{parse_links, parse_tags, strip_tags};

/// Input to [`CaptureService::create_capture`]
#[derive(Debug, Clone, Default)]
pub struct CreateCaptureInput {
    /// Rich-text body
    pub body: String,
    /// Parent session to touch, when capturing into a session
    pub parent_id: Option<String>,
    /// Explicit previous capture or session for the `Previous` chain
    pub previous_id: Option<String>,
    /// Original creation time, supplied by import paths
    pub created_override: Option<DateTime<Utc>>,
}

pub struct CaptureService<R> {
    repository: Arc<R>,
    upserter: NodeUpserter<R>,
    relationships: RelationshipService<R>,
    expansion: ExpansionService<R>,
    gateway: ExtractionGateway,
    html: Arc<dyn HtmlToText>,
}

impl<R: GraphRepository> CaptureService<R> {
    pub fn new(
        repository: Arc<R>,
        gateway: ExtractionGateway,
        html: Arc<dyn HtmlToText>,
    ) -> Self {
        Self {
            upserter: NodeUpserter::new(Arc::clone(&repository)),
            relationships: RelationshipService::new(Arc::clone(&repository)),
            expansion: ExpansionService::new(Arc::clone(&repository)),
            repository,
            gateway,
            html,
        }
    }

    /// Create a capture and weave it into the graph. Returns the expanded
    /// neighborhood of the new capture, rooted at it.
    pub async fn create_capture(
        &self,
        user: &AuthenticatedUser,
        input: CreateCaptureInput,
    ) -> Result<Graph> {
        validate_body(&input.body)?;
        let plain_text = self.html.to_plain_text(&input.body);

        // The owner node is created externally by the auth collaborator;
        // merging keeps the ownership edge's endpoint valid either way.
        self.repository
            .merge_node(&GraphNode::User(User::from_identity(user)))
            .await?;

        let mut capture = Capture::new(&user.id, &input.body, &plain_text);
        if let Some(created) = input.created_override {
            capture = capture.with_created(created);
        }
        self.repository
            .save_node(&GraphNode::Capture(capture.clone()))
            .await?;
        self.relationships
            .create(user, &user.id, &capture.id, EdgeKind::Created, None)
            .await?;

        tokio::try_join!(
            self.touch_parent(user, input.parent_id.as_deref()),
            self.create_previous_edge(user, &capture.id, input.previous_id.as_deref()),
            self.create_relations(user, &capture.id, &plain_text),
        )?;

        info!(capture_id = %capture.id, "Capture created");
        self.expansion.get_by_id(user, &capture.id).await
    }

    /// Replace a capture's body and regenerate every derived relationship
    pub async fn edit_capture(
        &self,
        user: &AuthenticatedUser,
        id: &str,
        body: &str,
    ) -> Result<Graph> {
        validate_body(body)?;

        let existing = match self.repository.get_node(&user.id, id).await? {
            Some(GraphNode::Capture(capture)) => capture,
            _ => return Err(Error::NotFound(id.to_string())),
        };

        let plain_text = self.html.to_plain_text(body);
        let updated = Capture {
            body: body.to_string(),
            plain_text: plain_text.clone(),
            ..existing
        };
        self.repository
            .save_node(&GraphNode::Capture(updated))
            .await?;

        let removed = self.repository.delete_derived_edges(&user.id, id).await?;
        debug!(capture_id = id, removed, "Derived edges cleared for regeneration");

        self.create_relations(user, id, &plain_text).await?;

        info!(capture_id = id, "Capture edited");
        self.expansion.get_by_id(user, id).await
    }

    /// Remove a capture and every edge touching it
    pub async fn delete_capture(&self, user: &AuthenticatedUser, id: &str) -> Result<bool> {
        let deleted = self.repository.delete_node(&user.id, id).await?;
        if deleted {
            info!(capture_id = id, "Capture deleted");
        }
        Ok(deleted)
    }

    /// Tombstone a capture: it disappears from listings and expansions but
    /// remains retrievable by direct id.
    pub async fn archive_capture(&self, user: &AuthenticatedUser, id: &str) -> Result<bool> {
        let archived = self.repository.set_archived(&user.id, id, true).await?;
        if archived {
            info!(capture_id = id, "Capture archived");
        }
        Ok(archived)
    }

    /// Record that the user rejected a suggested relation between two
    /// captures. Additive and idempotent in effect.
    pub async fn dismiss_capture_relation(
        &self,
        user: &AuthenticatedUser,
        from_id: &str,
        to_id: &str,
    ) -> Result<bool> {
        self.relationships
            .create(user, from_id, to_id, EdgeKind::DismissedRelation, None)
            .await?;
        Ok(true)
    }

    async fn touch_parent(&self, user: &AuthenticatedUser, parent_id: Option<&str>) -> Result<()> {
        if let Some(parent_id) = parent_id {
            if NodeLabel::of_id(parent_id) == Some(NodeLabel::Session) {
                self.repository
                    .touch_session(&user.id, parent_id, Utc::now())
                    .await?;
            }
        }
        Ok(())
    }

    async fn create_previous_edge(
        &self,
        user: &AuthenticatedUser,
        capture_id: &str,
        previous_id: Option<&str>,
    ) -> Result<()> {
        if let Some(previous_id) = previous_id {
            self.relationships
                .create(user, capture_id, previous_id, EdgeKind::Previous, None)
                .await?;
        }
        Ok(())
    }

    /// Derive tag, entity and link relationships concurrently
    async fn create_relations(
        &self,
        user: &AuthenticatedUser,
        capture_id: &str,
        plain_text: &str,
    ) -> Result<()> {
        tokio::try_join!(
            self.create_tag_relations(user, capture_id, plain_text),
            self.create_entity_relations(user, capture_id, plain_text),
            self.create_link_relations(user, capture_id, plain_text),
        )?;
        Ok(())
    }

    async fn create_tag_relations(
        &self,
        user: &AuthenticatedUser,
        capture_id: &str,
        plain_text: &str,
    ) -> Result<()> {
        for tag_text in parse_tags(plain_text) {
            let tag = self.upserter.upsert_tag(user, &tag_text).await?;
            self.relationships
                .create(user, capture_id, &tag.id, EdgeKind::TaggedWith, None)
                .await?;
        }
        Ok(())
    }

    async fn create_entity_relations(
        &self,
        user: &AuthenticatedUser,
        capture_id: &str,
        plain_text: &str,
    ) -> Result<()> {
        // Tags are stripped so the NLP collaborator never sees them
        let stripped = strip_tags(plain_text);
        for extracted in self.gateway.extract_or_empty(&stripped).await {
            let entity = self
                .upserter
                .upsert_entity(user, &extracted.name, extracted.category, extracted.metadata)
                .await?;
            self.relationships
                .create(
                    user,
                    capture_id,
                    &entity.id,
                    EdgeKind::References,
                    Some(extracted.salience),
                )
                .await?;
        }
        Ok(())
    }

    async fn create_link_relations(
        &self,
        user: &AuthenticatedUser,
        capture_id: &str,
        plain_text: &str,
    ) -> Result<()> {
        for url in parse_links(plain_text) {
            let link = self.upserter.upsert_link(user, &url).await?;
            self.relationships
                .create(user, capture_id, &link.id, EdgeKind::LinksTo, None)
                .await?;
        }
        Ok(())
    }
}

fn validate_body(body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Err(Error::Validation("capture body must not be empty".into()));
    }
    Ok(())
}
