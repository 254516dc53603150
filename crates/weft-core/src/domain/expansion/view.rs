//! Renderable graph view assembled from a two-hop expansion

use std::collections::HashSet;

use serde::Serialize;

use crate::domain::graph::edge::{EdgeKind, GraphEdge};
use crate::domain::graph::node::{GraphNode, NodeLabel};

/// A node prepared for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphViewNode {
    pub id: String,
    pub label: NodeLabel,
    /// First non-empty of body/name/title/url, else "Untitled"
    pub text: String,
    /// 0 for the root set (including a supplied focus id), 1 otherwise
    pub level: u8,
}

/// An edge prepared for rendering, endpoints mapped to external node ids
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphViewEdge {
    pub source: String,
    pub destination: String,
    pub kind: EdgeKind,
    pub salience: Option<f32>,
}

/// A deduplicated neighborhood subgraph ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Graph {
    pub nodes: Vec<GraphViewNode>,
    pub edges: Vec<GraphViewEdge>,
}

impl Graph {
    /// Assemble a view from stored nodes and edges.
    ///
    /// Nodes are deduplicated by id preserving first appearance (roots come
    /// first, so a root reached again at second degree stays at level 0).
    /// Edges referencing nodes outside the set are dropped.
    pub fn assemble(
        nodes: impl IntoIterator<Item = GraphNode>,
        edges: impl IntoIterator<Item = GraphEdge>,
        root_ids: &HashSet<String>,
    ) -> Self {
        let mut seen_nodes: HashSet<String> = HashSet::new();
        let mut view_nodes: Vec<GraphViewNode> = Vec::new();

        for node in nodes {
            if !seen_nodes.insert(node.id().to_string()) {
                continue;
            }
            let level = if root_ids.contains(node.id()) { 0 } else { 1 };
            view_nodes.push(GraphViewNode {
                id: node.id().to_string(),
                label: node.label(),
                text: node.display_text().to_string(),
                level,
            });
        }

        let mut seen_edges: HashSet<String> = HashSet::new();
        let edges = edges
            .into_iter()
            .filter(|edge| {
                seen_nodes.contains(&edge.source_id) && seen_nodes.contains(&edge.target_id)
            })
            .filter(|edge| seen_edges.insert(edge.id.clone()))
            .map(|edge| GraphViewEdge {
                source: edge.source_id,
                destination: edge.target_id,
                kind: edge.kind,
                salience: edge.salience,
            })
            .collect();

        Self {
            nodes: view_nodes,
            edges,
        }
    }
}

/// Pagination window for root selection. `total` for expansion-based queries
/// is the size of the assembled node set, not the root count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub start: i64,
    pub count: i64,
    pub total: i64,
}

/// A graph plus the paging information of the query that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults {
    pub graph: Graph,
    pub page_info: PageInfo,
}
