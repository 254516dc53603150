//! Weft Core Library
//!
//! This crate provides the core functionality for Weft, including:
//! - Capture ingestion (tag parsing, entity extraction, relationship creation)
//! - The personal knowledge graph model (captures, sessions, tags, entities, links)
//! - Graph expansion (two-hop neighborhood assembly for visualization)
//! - Storage (SQLite property graph + FTS5 search index)
//! - NLP entity extraction via an external HTTP service
//!
//! The transport layer (HTTP/API and its authentication) is an external
//! collaborator: every operation takes an [`domain::auth::AuthenticatedUser`]
//! explicitly rather than reading ambient request state.

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::auth::AuthenticatedUser;
    pub use crate::domain::capture::CaptureService;
    pub use crate::domain::expansion::{ExpansionService, Graph, ListUseCase, SearchResults};
    pub use crate::domain::session::SessionService;
    pub use crate::error::{Error, Result};
}
