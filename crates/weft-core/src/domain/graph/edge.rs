//! Typed, directed, owner-scoped relationships between graph nodes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Relationship kinds
///
/// `References`, `TaggedWith` and `LinksTo` are derived from capture text and
/// are fully regenerated on every edit. `Previous` and `DismissedRelation`
/// record explicit user intent and survive edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// User -> Capture/Session, the implicit ownership edge
    Created,
    /// Capture -> Entity, carries salience
    References,
    /// Capture -> Tag
    TaggedWith,
    /// Capture -> Link
    LinksTo,
    /// Capture -> Capture|Session, client-specified chain pointer
    Previous,
    /// Capture -> Capture, a suggested relation the user rejected
    DismissedRelation,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::References => "references",
            Self::TaggedWith => "tagged_with",
            Self::LinksTo => "links_to",
            Self::Previous => "previous",
            Self::DismissedRelation => "dismissed_relation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "references" => Some(Self::References),
            "tagged_with" => Some(Self::TaggedWith),
            "links_to" => Some(Self::LinksTo),
            "previous" => Some(Self::Previous),
            "dismissed_relation" => Some(Self::DismissedRelation),
            _ => None,
        }
    }

    /// Whether edges of this kind are deleted and recreated on capture edit
    pub fn is_derived(&self) -> bool {
        matches!(self, Self::References | Self::TaggedWith | Self::LinksTo)
    }

    pub fn derived() -> &'static [EdgeKind] {
        &[Self::References, Self::TaggedWith, Self::LinksTo]
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed edge between two owned nodes, timestamped at creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub owner_id: String,
    pub source_id: String,
    pub target_id: String,
    pub kind: EdgeKind,
    /// Only meaningful for `References` edges
    pub salience: Option<f32>,
    pub created: DateTime<Utc>,
}

impl GraphEdge {
    pub fn new(
        owner_id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        kind: EdgeKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind,
            salience: None,
            created: Utc::now(),
        }
    }

    pub fn with_salience(mut self, salience: f32) -> Self {
        self.salience = Some(salience.clamp(0.0, 1.0));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_classification() {
        assert!(EdgeKind::TaggedWith.is_derived());
        assert!(EdgeKind::References.is_derived());
        assert!(EdgeKind::LinksTo.is_derived());
        assert!(!EdgeKind::Previous.is_derived());
        assert!(!EdgeKind::DismissedRelation.is_derived());
        assert!(!EdgeKind::Created.is_derived());
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            EdgeKind::Created,
            EdgeKind::References,
            EdgeKind::TaggedWith,
            EdgeKind::LinksTo,
            EdgeKind::Previous,
            EdgeKind::DismissedRelation,
        ] {
            assert_eq!(EdgeKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EdgeKind::parse("unknown"), None);
    }

    #[test]
    fn test_salience_clamped() {
        let edge = GraphEdge::new("u", "a", "b", EdgeKind::References).with_salience(1.7);
        assert_eq!(edge.salience, Some(1.0));
    }
}
