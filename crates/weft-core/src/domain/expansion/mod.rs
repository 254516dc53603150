//! Two-hop graph expansion for visualization and recall

pub mod service;
pub mod view;

pub use service::{ExpansionService, ListUseCase};
pub use view::{Graph, GraphViewEdge, GraphViewNode, PageInfo, SearchResults};
