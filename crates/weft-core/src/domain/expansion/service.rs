//! Graph expansion resolver
//!
//! Turns a root selection strategy plus the fixed two-hop expansion rule into
//! a renderable [`Graph`]: roots, then first-degree Tag/Entity/Session/Link
//! neighbors, then second-degree non-archived captures owned by the
//! requesting user. Nodes and edges are deduplicated; levels are 0 for the
//! root set and 1 for everything else. The rule is identical for every
//! strategy; only root selection differs.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tracing::debug;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::graph::edge::EdgeKind;
use crate::domain::graph::node::{GraphNode, NodeLabel};
use crate::domain::graph::repository::GraphRepository;
use crate::error::{Error, Result};

use super::view::{Graph, PageInfo, SearchResults};

/// Cap on roots for the recent/today listing strategies
const LIST_ROOT_LIMIT: i64 = 50;

/// First-degree neighbor labels: the classifier nodes captures connect to
const FIRST_DEGREE_LABELS: &[NodeLabel] = &[
    NodeLabel::Tag,
    NodeLabel::Entity,
    NodeLabel::Session,
    NodeLabel::Link,
];

/// Listing variants for [`ExpansionService::get_all`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListUseCase {
    All,
    CapturedToday,
}

pub struct ExpansionService<R> {
    repository: Arc<R>,
}

impl<R> Clone for ExpansionService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: GraphRepository> ExpansionService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Expand around a single explicit node id.
    ///
    /// A capture id is its own root, archived or not (direct-id retrieval is
    /// the one path archive filtering does not apply to). Any other node id
    /// becomes a focus: its adjacent non-archived captures are the roots, and
    /// the focus id itself joins the level-0 set.
    pub async fn get_by_id(&self, user: &AuthenticatedUser, id: &str) -> Result<Graph> {
        let node = self
            .repository
            .get_node(&user.id, id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if node.label() == NodeLabel::Capture {
            self.expand(user, vec![node], None).await
        } else {
            let roots = self
                .repository
                .neighbors(&user.id, &[id.to_string()], &[NodeLabel::Capture], true)
                .await?;
            self.expand(user, roots, Some(node)).await
        }
    }

    /// Full-text search. Pagination bounds the root captures before
    /// expansion, so the assembled graph can be much larger than `count`.
    /// An empty query falls back to a random capture.
    pub async fn search(
        &self,
        user: &AuthenticatedUser,
        query: &str,
        start: i64,
        count: i64,
    ) -> Result<SearchResults> {
        if query.trim().is_empty() {
            return self.random(user).await;
        }

        let roots = self
            .repository
            .search_captures(&user.id, query, start, count)
            .await?;
        debug!(query, roots = roots.len(), "Search roots selected");

        let graph = self.expand(user, roots, None).await?;
        let total = graph.nodes.len() as i64;
        Ok(SearchResults {
            graph,
            page_info: PageInfo { start, count, total },
        })
    }

    /// List recent captures, optionally restricted to "today" in the
    /// client's timezone (expressed as an hour offset from UTC).
    pub async fn get_all(
        &self,
        user: &AuthenticatedUser,
        use_case: ListUseCase,
        timezone_offset_hours: Option<i32>,
    ) -> Result<SearchResults> {
        let roots = match use_case {
            ListUseCase::All => {
                self.repository
                    .recent_captures(&user.id, LIST_ROOT_LIMIT)
                    .await?
            }
            ListUseCase::CapturedToday => {
                let since = start_of_day(Utc::now(), timezone_offset_hours.unwrap_or(0));
                self.repository
                    .captures_since(&user.id, since, LIST_ROOT_LIMIT)
                    .await?
            }
        };

        let graph = self.expand(user, roots, None).await?;
        let total = graph.nodes.len() as i64;
        Ok(SearchResults {
            graph,
            page_info: PageInfo {
                start: 0,
                count: total,
                total,
            },
        })
    }

    /// Expand around one uniformly sampled non-archived capture
    pub async fn random(&self, user: &AuthenticatedUser) -> Result<SearchResults> {
        let roots = match self.repository.random_capture(&user.id).await? {
            Some(node) => vec![node],
            None => Vec::new(),
        };

        let graph = self.expand(user, roots, None).await?;
        let total = graph.nodes.len() as i64;
        Ok(SearchResults {
            graph,
            page_info: PageInfo {
                start: 0,
                count: total,
                total,
            },
        })
    }

    /// The fixed two-hop expansion rule.
    ///
    /// A supplied focus node joins the level-0 set and is always part of the
    /// view, even when it has no adjacent captures. Archived captures are
    /// excluded at second degree on every path; a dismissed-relation edge
    /// never appears in the assembled output.
    async fn expand(
        &self,
        user: &AuthenticatedUser,
        roots: Vec<GraphNode>,
        focus: Option<GraphNode>,
    ) -> Result<Graph> {
        let root_ids: Vec<String> = roots.iter().map(|n| n.id().to_string()).collect();

        let first_degree = if root_ids.is_empty() {
            Vec::new()
        } else {
            self.repository
                .neighbors(&user.id, &root_ids, FIRST_DEGREE_LABELS, false)
                .await?
        };

        let first_ids: Vec<String> = first_degree.iter().map(|n| n.id().to_string()).collect();
        let second_degree = if first_ids.is_empty() {
            Vec::new()
        } else {
            self.repository
                .neighbors(&user.id, &first_ids, &[NodeLabel::Capture], true)
                .await?
        };

        let mut all_ids: Vec<String> =
            Vec::with_capacity(root_ids.len() + first_ids.len() + second_degree.len() + 1);
        all_ids.extend(root_ids.iter().cloned());
        all_ids.extend(focus.iter().map(|n| n.id().to_string()));
        all_ids.extend(first_ids.iter().cloned());
        all_ids.extend(second_degree.iter().map(|n| n.id().to_string()));

        let edges = if all_ids.is_empty() {
            Vec::new()
        } else {
            self.repository.edges_within(&user.id, &all_ids).await?
        };
        let edges = edges
            .into_iter()
            .filter(|edge| edge.kind != EdgeKind::DismissedRelation);

        let mut level_zero: HashSet<String> = root_ids.iter().cloned().collect();
        if let Some(focus) = &focus {
            level_zero.insert(focus.id().to_string());
        }

        let nodes = roots
            .into_iter()
            .chain(focus)
            .chain(first_degree)
            .chain(second_degree);
        Ok(Graph::assemble(nodes, edges, &level_zero))
    }
}

/// Start of the client's current day, converted back to UTC.
///
/// `offset_hours` is the client's UTC offset: shift into local time, truncate
/// to midnight, shift back.
fn start_of_day(now: DateTime<Utc>, offset_hours: i32) -> DateTime<Utc> {
    let offset = Duration::hours(offset_hours as i64);
    let local = now + offset;
    let midnight = local.date_naive().and_time(NaiveTime::MIN);
    DateTime::from_naive_utc_and_offset(midnight, Utc) - offset
}
