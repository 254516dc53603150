//! Graph node types for the personal knowledge graph
//!
//! All nodes are owned by exactly one user and carry URN-style ids. Capture
//! and Session ids are random; Tag, Entity and Link ids are derived from a
//! normalized natural key so that identical tags, entities and URLs collapse
//! to a single node per owner. Derivation is the basis of the merge-on-key
//! upsert semantics in [`super::upsert`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// URN namespace shared by all node ids
pub const URN_PREFIX: &str = "urn:weft";

/// Node labels, mirroring the stored `label` discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeLabel {
    User,
    Capture,
    Session,
    Tag,
    Entity,
    Link,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Capture => "capture",
            Self::Session => "session",
            Self::Tag => "tag",
            Self::Entity => "entity",
            Self::Link => "link",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "capture" => Some(Self::Capture),
            "session" => Some(Self::Session),
            "tag" => Some(Self::Tag),
            "entity" => Some(Self::Entity),
            "link" => Some(Self::Link),
            _ => None,
        }
    }

    /// Read the label segment out of a node urn (`urn:weft:<label>:...`)
    pub fn of_id(id: &str) -> Option<Self> {
        let rest = id.strip_prefix(URN_PREFIX)?.strip_prefix(':')?;
        let label = rest.split(':').next()?;
        Self::parse(label)
    }
}

impl std::fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn urn(label: NodeLabel, suffix: &str) -> String {
    format!("{}:{}:{}", URN_PREFIX, label.as_str(), suffix)
}

/// Last urn segment, used to embed an owner's uuid into derived node ids
fn urn_tail(id: &str) -> &str {
    id.rsplit(':').next().unwrap_or(id)
}

/// A user of the system. Created by the auth collaborator; this core only
/// ever merges the node so ownership edges have a valid endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub owner_id: String,
    pub email: String,
    pub name: String,
    pub created: DateTime<Utc>,
}

impl User {
    pub fn from_identity(identity: &crate::domain::auth::AuthenticatedUser) -> Self {
        Self {
            id: identity.id.clone(),
            owner_id: identity.id.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            created: Utc::now(),
        }
    }
}

/// A single user-authored note, the primary content unit of the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    pub id: String,
    pub owner_id: String,
    /// Original rich text as submitted
    pub body: String,
    /// Derived newline-preserving plain rendering, used for search and NLP
    pub plain_text: String,
    pub created: DateTime<Utc>,
    pub archived: bool,
}

impl Capture {
    pub fn new(
        owner_id: impl Into<String>,
        body: impl Into<String>,
        plain_text: impl Into<String>,
    ) -> Self {
        Self {
            id: urn(NodeLabel::Capture, &Uuid::new_v4().to_string()),
            owner_id: owner_id.into(),
            body: body.into(),
            plain_text: plain_text.into(),
            created: Utc::now(),
            archived: false,
        }
    }

    /// Override the creation timestamp (import paths supply the original one)
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }
}

/// A named collection grouping related captures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub created: DateTime<Utc>,
    /// Touched whenever a capture is created with this session as parent
    pub last_modified: DateTime<Utc>,
}

impl Session {
    pub fn new(owner_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: urn(NodeLabel::Session, &Uuid::new_v4().to_string()),
            owner_id: owner_id.into(),
            title: title.into(),
            created: now,
            last_modified: now,
        }
    }
}

/// An explicit `#hashtag` classifier node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub owner_id: String,
    /// Normalized tag text (lowercased)
    pub text: String,
    pub created: DateTime<Utc>,
}

impl Tag {
    pub fn new(owner_id: &str, text: &str) -> Self {
        let text = Self::normalize(text);
        Self {
            id: Self::id_for(owner_id, &text),
            owner_id: owner_id.to_string(),
            text,
            created: Utc::now(),
        }
    }

    pub fn normalize(text: &str) -> String {
        text.trim().to_lowercase()
    }

    /// Natural key: identical tags across captures collapse to one node
    pub fn id_for(owner_id: &str, normalized: &str) -> String {
        urn(NodeLabel::Tag, &format!("{}:{}", urn_tail(owner_id), normalized))
    }
}

/// NLP category assigned to an extracted entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    Person,
    Organization,
    Location,
    Event,
    WorkOfArt,
    ConsumerGood,
    Other,
    Unknown,
}

impl EntityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Organization => "organization",
            Self::Location => "location",
            Self::Event => "event",
            Self::WorkOfArt => "work_of_art",
            Self::ConsumerGood => "consumer_good",
            Self::Other => "other",
            Self::Unknown => "unknown",
        }
    }

    /// Parse either our stored form or the NLP collaborator's upper-case form
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "person" => Self::Person,
            "organization" => Self::Organization,
            "location" => Self::Location,
            "event" => Self::Event,
            "work_of_art" => Self::WorkOfArt,
            "consumer_good" => Self::ConsumerGood,
            "other" => Self::Other,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Optional knowledge-base reference reported by the NLP collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeMetadata {
    pub wikipedia: Option<String>,
    pub mid: Option<String>,
}

/// An NLP-inferred classifier node. Salience is per-edge, not stored here,
/// because it varies with every capture that references the entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub category: EntityCategory,
    pub metadata: Option<KnowledgeMetadata>,
    pub created: DateTime<Utc>,
}

impl Entity {
    pub fn new(
        owner_id: &str,
        name: &str,
        category: EntityCategory,
        metadata: Option<KnowledgeMetadata>,
    ) -> Self {
        Self {
            id: Self::id_for(owner_id, name, category),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            category,
            metadata,
            created: Utc::now(),
        }
    }

    /// Canonicalize a name for deduplication
    ///
    /// Converts to lowercase, removes special characters, and normalizes
    /// whitespace.
    pub fn canonicalize(name: &str) -> String {
        name.to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn id_for(owner_id: &str, name: &str, category: EntityCategory) -> String {
        urn(
            NodeLabel::Entity,
            &format!(
                "{}:{}:{}",
                urn_tail(owner_id),
                category.as_str(),
                Self::canonicalize(name).replace(' ', "-")
            ),
        )
    }
}

/// A hyperlink node, deduplicated across captures by canonical URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub owner_id: String,
    /// Canonicalized URL
    pub url: String,
    pub created: DateTime<Utc>,
}

impl Link {
    pub fn new(owner_id: &str, url: &str) -> Self {
        let url = Self::canonicalize(url);
        Self {
            id: Self::id_for(owner_id, &url),
            owner_id: owner_id.to_string(),
            url,
            created: Utc::now(),
        }
    }

    /// Drop the fragment and any trailing slash; URLs that differ only in
    /// those render the same resource for our purposes.
    pub fn canonicalize(url: &str) -> String {
        let url = url.trim();
        let url = url.split('#').next().unwrap_or(url);
        url.trim_end_matches('/').to_string()
    }

    pub fn id_for(owner_id: &str, canonical_url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(urn_tail(owner_id).as_bytes());
        hasher.update(b":");
        hasher.update(canonical_url.as_bytes());
        let digest = hasher.finalize();
        urn(NodeLabel::Link, &hex::encode(&digest[..16]))
    }
}

/// Any node in the graph, unified for storage and traversal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "label", rename_all = "snake_case")]
pub enum GraphNode {
    User(User),
    Capture(Capture),
    Session(Session),
    Tag(Tag),
    Entity(Entity),
    Link(Link),
}

impl GraphNode {
    pub fn id(&self) -> &str {
        match self {
            Self::User(n) => &n.id,
            Self::Capture(n) => &n.id,
            Self::Session(n) => &n.id,
            Self::Tag(n) => &n.id,
            Self::Entity(n) => &n.id,
            Self::Link(n) => &n.id,
        }
    }

    pub fn owner_id(&self) -> &str {
        match self {
            Self::User(n) => &n.owner_id,
            Self::Capture(n) => &n.owner_id,
            Self::Session(n) => &n.owner_id,
            Self::Tag(n) => &n.owner_id,
            Self::Entity(n) => &n.owner_id,
            Self::Link(n) => &n.owner_id,
        }
    }

    pub fn label(&self) -> NodeLabel {
        match self {
            Self::User(_) => NodeLabel::User,
            Self::Capture(_) => NodeLabel::Capture,
            Self::Session(_) => NodeLabel::Session,
            Self::Tag(_) => NodeLabel::Tag,
            Self::Entity(_) => NodeLabel::Entity,
            Self::Link(_) => NodeLabel::Link,
        }
    }

    pub fn created(&self) -> DateTime<Utc> {
        match self {
            Self::User(n) => n.created,
            Self::Capture(n) => n.created,
            Self::Session(n) => n.created,
            Self::Tag(n) => n.created,
            Self::Entity(n) => n.created,
            Self::Link(n) => n.created,
        }
    }

    pub fn archived(&self) -> bool {
        match self {
            Self::Capture(n) => n.archived,
            _ => false,
        }
    }

    /// Display label fallback chain: body, name, title, url, "Untitled"
    pub fn display_text(&self) -> &str {
        let text = match self {
            Self::Capture(n) => n.body.as_str(),
            Self::Entity(n) => n.name.as_str(),
            Self::User(n) => n.name.as_str(),
            Self::Session(n) => n.title.as_str(),
            Self::Link(n) => n.url.as_str(),
            Self::Tag(n) => n.text.as_str(),
        };
        if text.is_empty() { "Untitled" } else { text }
    }
}
