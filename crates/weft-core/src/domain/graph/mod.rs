//! The personal knowledge graph: nodes, edges, and their persistence seam

pub mod edge;
pub mod node;
pub mod relationships;
pub mod repository;
pub mod upsert;

pub use edge::{EdgeKind, GraphEdge};
pub use node::{
    Capture, Entity, EntityCategory, GraphNode, KnowledgeMetadata, Link, NodeLabel, Session, Tag,
    User,
};
pub use relationships::RelationshipService;
pub use repository::GraphRepository;
pub use upsert::NodeUpserter;
