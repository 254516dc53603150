//! SQLite implementation of the GraphRepository
//!
//! Nodes of every label share one table with a `label` discriminator and a
//! sparse column set; edges cascade-delete with their endpoints. FTS5 backs
//! capture search, with the index maintained here on insert, replace and
//! delete. Caller-supplied values are always bound; the only query text
//! built at runtime is `?` placeholder lists sized to slice arguments.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use crate::domain::graph::edge::{EdgeKind, GraphEdge};
use crate::domain::graph::node::{
    Capture, Entity, EntityCategory, GraphNode, Link, NodeLabel, Session, Tag, User,
};
use crate::domain::graph::repository::GraphRepository;
use crate::error::{Error, Result};

/// SQLite implementation of the graph repository
#[derive(Clone)]
pub struct SqliteGraphRepository {
    pool: SqlitePool,
}

impl SqliteGraphRepository {
    /// Create a new SQLite graph repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Fixed-width rfc3339 with microseconds, so string comparison in SQL agrees
/// with chronological order
fn format_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// `?, ?, ...` sized to `n`
fn placeholders(n: usize) -> String {
    std::iter::repeat("?").take(n).collect::<Vec<_>>().join(", ")
}

/// Quote a user query for FTS5 MATCH: each token becomes a quoted string
/// (internal quotes doubled), the last one a prefix term.
fn fts_quote(query: &str) -> String {
    let tokens: Vec<String> = query
        .split_whitespace()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    match tokens.split_last() {
        Some((last, rest)) if rest.is_empty() => format!("{}*", last),
        Some((last, rest)) => format!("{} {}*", rest.join(" "), last),
        None => String::new(),
    }
}

const NODE_UPSERT: &str = r#"
    INSERT INTO nodes (
        id, owner_id, label, body, plain_text, archived,
        email, name, title, last_modified_at, text, category, metadata, url,
        created_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        body = excluded.body,
        plain_text = excluded.plain_text,
        archived = excluded.archived,
        email = excluded.email,
        name = excluded.name,
        title = excluded.title,
        last_modified_at = excluded.last_modified_at,
        text = excluded.text,
        category = excluded.category,
        metadata = excluded.metadata,
        url = excluded.url
"#;

const NODE_MERGE: &str = r#"
    INSERT INTO nodes (
        id, owner_id, label, body, plain_text, archived,
        email, name, title, last_modified_at, text, category, metadata, url,
        created_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO NOTHING
"#;

#[async_trait]
impl GraphRepository for SqliteGraphRepository {
    // ========== Node Operations ==========

    async fn merge_node(&self, node: &GraphNode) -> Result<GraphNode> {
        let columns = NodeColumns::from_node(node)?;
        columns.bind(sqlx::query(NODE_MERGE)).execute(&self.pool).await?;

        // The insert is atomic; whichever writer lost the race reads back
        // the winner's row here.
        let stored = self
            .get_node(node.owner_id(), node.id())
            .await?
            .ok_or_else(|| Error::NotFound(node.id().to_string()))?;

        if matches!(stored, GraphNode::Capture(_)) {
            self.reindex_capture(&stored).await?;
        }

        debug!(node_id = %stored.id(), label = %stored.label(), "Node merged");
        Ok(stored)
    }

    async fn save_node(&self, node: &GraphNode) -> Result<()> {
        let columns = NodeColumns::from_node(node)?;
        columns.bind(sqlx::query(NODE_UPSERT)).execute(&self.pool).await?;

        if matches!(node, GraphNode::Capture(_)) {
            self.reindex_capture(node).await?;
        }

        debug!(node_id = %node.id(), label = %node.label(), "Node saved");
        Ok(())
    }

    async fn get_node(&self, owner_id: &str, id: &str) -> Result<Option<GraphNode>> {
        let row: Option<NodeRow> =
            sqlx::query_as("SELECT * FROM nodes WHERE id = ? AND owner_id = ?")
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|r| r.into_node()).transpose()
    }

    async fn delete_node(&self, owner_id: &str, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM nodes WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            sqlx::query("DELETE FROM captures_fts WHERE node_id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            info!(node_id = %id, "Node deleted");
        }
        Ok(deleted)
    }

    async fn set_archived(&self, owner_id: &str, id: &str, archived: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE nodes SET archived = ? WHERE id = ? AND owner_id = ? AND label = 'capture'",
        )
        .bind(archived)
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn touch_session(
        &self,
        owner_id: &str,
        session_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE nodes SET last_modified_at = ? WHERE id = ? AND owner_id = ? AND label = 'session'",
        )
        .bind(format_ts(at))
        .bind(session_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ========== Edge Operations ==========

    async fn create_edge(&self, edge: &GraphEdge) -> Result<()> {
        let endpoints: Vec<(String,)> =
            sqlx::query_as("SELECT id FROM nodes WHERE id IN (?, ?) AND owner_id = ?")
                .bind(&edge.source_id)
                .bind(&edge.target_id)
                .bind(&edge.owner_id)
                .fetch_all(&self.pool)
                .await?;

        for endpoint in [&edge.source_id, &edge.target_id] {
            if !endpoints.iter().any(|(id,)| id == endpoint) {
                return Err(Error::NotFound(endpoint.clone()));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO edges (id, owner_id, source_id, target_id, kind, salience, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&edge.id)
        .bind(&edge.owner_id)
        .bind(&edge.source_id)
        .bind(&edge.target_id)
        .bind(edge.kind.as_str())
        .bind(edge.salience)
        .bind(format_ts(edge.created))
        .execute(&self.pool)
        .await?;

        debug!(
            source = %edge.source_id,
            target = %edge.target_id,
            kind = %edge.kind,
            "Edge created"
        );
        Ok(())
    }

    async fn delete_edge(
        &self,
        owner_id: &str,
        source_id: &str,
        target_id: &str,
        kind: EdgeKind,
    ) -> Result<()> {
        sqlx::query(
            "DELETE FROM edges WHERE owner_id = ? AND source_id = ? AND target_id = ? AND kind = ?",
        )
        .bind(owner_id)
        .bind(source_id)
        .bind(target_id)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_derived_edges(&self, owner_id: &str, capture_id: &str) -> Result<u64> {
        let kinds = EdgeKind::derived();
        let query = format!(
            "DELETE FROM edges WHERE owner_id = ? AND source_id = ? AND kind IN ({})",
            placeholders(kinds.len())
        );

        let mut q = sqlx::query(&query).bind(owner_id).bind(capture_id);
        for kind in kinds {
            q = q.bind(kind.as_str());
        }
        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    // ========== Traversal Operations ==========

    async fn neighbors(
        &self,
        owner_id: &str,
        ids: &[String],
        labels: &[NodeLabel],
        exclude_archived: bool,
    ) -> Result<Vec<GraphNode>> {
        if ids.is_empty() || labels.is_empty() {
            return Ok(Vec::new());
        }

        let id_list = placeholders(ids.len());
        let archived_filter = if exclude_archived {
            "AND n.archived = 0"
        } else {
            ""
        };
        let query = format!(
            r#"
            SELECT DISTINCT n.* FROM nodes n
            JOIN edges e ON (
                (e.source_id IN ({id_list}) AND n.id = e.target_id)
                OR (e.target_id IN ({id_list}) AND n.id = e.source_id)
            )
            WHERE n.owner_id = ? AND e.owner_id = ?
              AND n.label IN ({label_list})
              AND n.id NOT IN ({id_list})
              {archived_filter}
            "#,
            id_list = id_list,
            label_list = placeholders(labels.len()),
            archived_filter = archived_filter,
        );

        let mut q = sqlx::query_as::<_, NodeRow>(&query);
        for id in ids {
            q = q.bind(id);
        }
        for id in ids {
            q = q.bind(id);
        }
        q = q.bind(owner_id).bind(owner_id);
        for label in labels {
            q = q.bind(label.as_str());
        }
        for id in ids {
            q = q.bind(id);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.into_node()).collect()
    }

    async fn edges_within(&self, owner_id: &str, ids: &[String]) -> Result<Vec<GraphEdge>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_list = placeholders(ids.len());
        let query = format!(
            "SELECT * FROM edges WHERE owner_id = ? AND source_id IN ({id_list}) AND target_id IN ({id_list})",
        );

        let mut q = sqlx::query_as::<_, EdgeRow>(&query).bind(owner_id);
        for id in ids {
            q = q.bind(id);
        }
        for id in ids {
            q = q.bind(id);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.into_edge()).collect()
    }

    // ========== Root Selection ==========

    async fn search_captures(
        &self,
        owner_id: &str,
        query: &str,
        start: i64,
        count: i64,
    ) -> Result<Vec<GraphNode>> {
        let match_expr = fts_quote(query);
        if match_expr.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<NodeRow> = sqlx::query_as(
            r#"
            SELECT n.* FROM nodes n
            JOIN captures_fts ON captures_fts.node_id = n.id
            WHERE captures_fts MATCH ?
              AND n.owner_id = ?
              AND n.archived = 0
            ORDER BY captures_fts.rank
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(&match_expr)
        .bind(owner_id)
        .bind(count)
        .bind(start)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_node()).collect()
    }

    async fn recent_captures(&self, owner_id: &str, limit: i64) -> Result<Vec<GraphNode>> {
        let rows: Vec<NodeRow> = sqlx::query_as(
            r#"
            SELECT * FROM nodes
            WHERE owner_id = ? AND label = 'capture' AND archived = 0
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_node()).collect()
    }

    async fn captures_since(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<GraphNode>> {
        let rows: Vec<NodeRow> = sqlx::query_as(
            r#"
            SELECT * FROM nodes
            WHERE owner_id = ? AND label = 'capture' AND archived = 0
              AND created_at > ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(owner_id)
        .bind(format_ts(since))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_node()).collect()
    }

    async fn random_capture(&self, owner_id: &str) -> Result<Option<GraphNode>> {
        let row: Option<NodeRow> = sqlx::query_as(
            r#"
            SELECT * FROM nodes
            WHERE owner_id = ? AND label = 'capture' AND archived = 0
            ORDER BY RANDOM()
            LIMIT 1
            "#,
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_node()).transpose()
    }
}

impl SqliteGraphRepository {
    /// Replace the FTS entry for a capture
    async fn reindex_capture(&self, node: &GraphNode) -> Result<()> {
        let GraphNode::Capture(capture) = node else {
            return Ok(());
        };

        sqlx::query("DELETE FROM captures_fts WHERE node_id = ?")
            .bind(&capture.id)
            .execute(&self.pool)
            .await?;
        sqlx::query("INSERT INTO captures_fts (plain_text, node_id) VALUES (?, ?)")
            .bind(&capture.plain_text)
            .bind(&capture.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Flattened node columns in table order, ready to bind
struct NodeColumns {
    id: String,
    owner_id: String,
    label: &'static str,
    body: Option<String>,
    plain_text: Option<String>,
    archived: bool,
    email: Option<String>,
    name: Option<String>,
    title: Option<String>,
    last_modified_at: Option<String>,
    text: Option<String>,
    category: Option<&'static str>,
    metadata: Option<String>,
    url: Option<String>,
    created_at: String,
}

impl NodeColumns {
    fn from_node(node: &GraphNode) -> Result<Self> {
        let mut columns = Self {
            id: node.id().to_string(),
            owner_id: node.owner_id().to_string(),
            label: node.label().as_str(),
            body: None,
            plain_text: None,
            archived: false,
            email: None,
            name: None,
            title: None,
            last_modified_at: None,
            text: None,
            category: None,
            metadata: None,
            url: None,
            created_at: format_ts(node.created()),
        };

        match node {
            GraphNode::User(user) => {
                columns.email = Some(user.email.clone());
                columns.name = Some(user.name.clone());
            }
            GraphNode::Capture(capture) => {
                columns.body = Some(capture.body.clone());
                columns.plain_text = Some(capture.plain_text.clone());
                columns.archived = capture.archived;
            }
            GraphNode::Session(session) => {
                columns.title = Some(session.title.clone());
                columns.last_modified_at = Some(format_ts(session.last_modified));
            }
            GraphNode::Tag(tag) => {
                columns.text = Some(tag.text.clone());
            }
            GraphNode::Entity(entity) => {
                columns.name = Some(entity.name.clone());
                columns.category = Some(entity.category.as_str());
                columns.metadata = entity
                    .metadata
                    .as_ref()
                    .map(|m| {
                        serde_json::to_string(m).map_err(|e| {
                            Error::Other(format!("Failed to serialize entity metadata: {}", e))
                        })
                    })
                    .transpose()?;
            }
            GraphNode::Link(link) => {
                columns.url = Some(link.url.clone());
            }
        }

        Ok(columns)
    }

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        query
            .bind(&self.id)
            .bind(&self.owner_id)
            .bind(self.label)
            .bind(&self.body)
            .bind(&self.plain_text)
            .bind(self.archived)
            .bind(&self.email)
            .bind(&self.name)
            .bind(&self.title)
            .bind(&self.last_modified_at)
            .bind(&self.text)
            .bind(self.category)
            .bind(&self.metadata)
            .bind(&self.url)
            .bind(&self.created_at)
    }
}

#[derive(Debug, FromRow)]
struct NodeRow {
    id: String,
    owner_id: String,
    label: String,
    body: Option<String>,
    plain_text: Option<String>,
    archived: bool,
    email: Option<String>,
    name: Option<String>,
    title: Option<String>,
    last_modified_at: Option<String>,
    text: Option<String>,
    category: Option<String>,
    metadata: Option<String>,
    url: Option<String>,
    created_at: String,
}

impl NodeRow {
    fn into_node(self) -> Result<GraphNode> {
        let label = NodeLabel::parse(&self.label)
            .ok_or_else(|| Error::Other(format!("Invalid node label: {}", self.label)))?;
        let created = parse_ts(&self.created_at);

        let node = match label {
            NodeLabel::User => GraphNode::User(User {
                id: self.id,
                owner_id: self.owner_id,
                email: self.email.unwrap_or_default(),
                name: self.name.unwrap_or_default(),
                created,
            }),
            NodeLabel::Capture => GraphNode::Capture(Capture {
                id: self.id,
                owner_id: self.owner_id,
                body: self.body.unwrap_or_default(),
                plain_text: self.plain_text.unwrap_or_default(),
                created,
                archived: self.archived,
            }),
            NodeLabel::Session => GraphNode::Session(Session {
                id: self.id,
                owner_id: self.owner_id,
                title: self.title.unwrap_or_default(),
                created,
                last_modified: self
                    .last_modified_at
                    .as_deref()
                    .map(parse_ts)
                    .unwrap_or(created),
            }),
            NodeLabel::Tag => GraphNode::Tag(Tag {
                id: self.id,
                owner_id: self.owner_id,
                text: self.text.unwrap_or_default(),
                created,
            }),
            NodeLabel::Entity => GraphNode::Entity(Entity {
                id: self.id,
                owner_id: self.owner_id,
                name: self.name.unwrap_or_default(),
                category: self
                    .category
                    .as_deref()
                    .map(EntityCategory::parse)
                    .unwrap_or(EntityCategory::Unknown),
                metadata: self
                    .metadata
                    .as_deref()
                    .and_then(|s| serde_json::from_str(s).ok()),
                created,
            }),
            NodeLabel::Link => GraphNode::Link(Link {
                id: self.id,
                owner_id: self.owner_id,
                url: self.url.unwrap_or_default(),
                created,
            }),
        };

        Ok(node)
    }
}

#[derive(Debug, FromRow)]
struct EdgeRow {
    id: String,
    owner_id: String,
    source_id: String,
    target_id: String,
    kind: String,
    salience: Option<f32>,
    created_at: String,
}

impl EdgeRow {
    fn into_edge(self) -> Result<GraphEdge> {
        let kind = EdgeKind::parse(&self.kind)
            .ok_or_else(|| Error::Other(format!("Invalid edge kind: {}", self.kind)))?;

        Ok(GraphEdge {
            id: self.id,
            owner_id: self.owner_id,
            source_id: self.source_id,
            target_id: self.target_id,
            kind,
            salience: self.salience,
            created: parse_ts(&self.created_at),
        })
    }
}
