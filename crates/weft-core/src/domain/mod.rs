//! Domain layer: the knowledge graph model and its services
//!
//! Organized by capability:
//! - `auth` — the explicit request identity every operation is scoped to
//! - `graph` — nodes, edges, repository seam, upsert and relationship services
//! - `capture` — text parsing and the capture ingestion pipeline
//! - `extraction` — the entity-extraction gateway and its collaborator trait
//! - `expansion` — the two-hop graph expansion resolver
//! - `session` — session (collection) operations

pub mod auth;
pub mod capture;
pub mod expansion;
pub mod extraction;
pub mod graph;
pub mod session;
