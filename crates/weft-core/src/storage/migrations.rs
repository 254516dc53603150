//! Database migrations
//!
//! This module manages SQLite schema migrations for weft.
//! Migrations are versioned and applied automatically on database connection.

use sqlx::SqlitePool;

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

/// SQL for creating the migrations tracking table
const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Migration 1: Property-graph schema
///
/// One table per graph element. Nodes of every label share a single table
/// with a `label` discriminator and a sparse column set; edges reference
/// nodes with cascading deletes, so removing a node removes every edge
/// touching it in the same statement.
const MIGRATION_V1: &str = r#"
    CREATE TABLE IF NOT EXISTS nodes (
        id TEXT PRIMARY KEY NOT NULL,
        owner_id TEXT NOT NULL,
        label TEXT NOT NULL CHECK (label IN ('user', 'capture', 'session', 'tag', 'entity', 'link')),

        -- Capture columns
        body TEXT,
        plain_text TEXT,
        archived INTEGER NOT NULL DEFAULT 0,

        -- User columns
        email TEXT,

        -- User / Entity columns
        name TEXT,

        -- Session columns
        title TEXT,
        last_modified_at TEXT,

        -- Tag columns
        text TEXT,

        -- Entity columns
        category TEXT,
        metadata TEXT,

        -- Link columns
        url TEXT,

        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_nodes_owner_label ON nodes(owner_id, label);
    CREATE INDEX IF NOT EXISTS idx_nodes_owner_label_created ON nodes(owner_id, label, created_at);

    CREATE TABLE IF NOT EXISTS edges (
        id TEXT PRIMARY KEY NOT NULL,
        owner_id TEXT NOT NULL,
        source_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
        target_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
        kind TEXT NOT NULL CHECK (kind IN (
            'created', 'references', 'tagged_with', 'links_to',
            'previous', 'dismissed_relation'
        )),
        salience REAL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_edges_owner_source ON edges(owner_id, source_id);
    CREATE INDEX IF NOT EXISTS idx_edges_owner_target ON edges(owner_id, target_id);
    CREATE INDEX IF NOT EXISTS idx_edges_kind ON edges(kind);
"#;

/// Migration 2: Full-text search over capture plain text
///
/// Contentless-delete is not available on all bundled SQLite builds, so the
/// index is maintained explicitly by the repository on capture insert,
/// replace and delete rather than by triggers keyed on rowid.
const MIGRATION_V2: &str = r#"
    CREATE VIRTUAL TABLE IF NOT EXISTS captures_fts USING fts5(
        plain_text,
        node_id UNINDEXED
    );
"#;

/// Get the current schema version from the database
async fn get_current_version(pool: &SqlitePool) -> anyhow::Result<i32> {
    // Ensure migrations table exists
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    // Get the latest version
    let row: Option<(i32,)> = sqlx::query_as("SELECT MAX(version) FROM _migrations")
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(v,)| v).unwrap_or(0))
}

/// Record that a migration has been applied
async fn record_migration(pool: &SqlitePool, version: i32) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let current_version = get_current_version(pool).await?;

    tracing::info!(
        current_version = current_version,
        target_version = CURRENT_VERSION,
        "Checking database migrations"
    );

    if current_version >= CURRENT_VERSION {
        tracing::debug!("Database is up to date");
        return Ok(());
    }

    // Apply migrations in order
    if current_version < 1 {
        tracing::info!("Applying migration v1: Property-graph schema");
        sqlx::raw_sql(MIGRATION_V1).execute(pool).await?;
        record_migration(pool, 1).await?;
    }

    if current_version < 2 {
        tracing::info!("Applying migration v2: Capture full-text search");
        sqlx::raw_sql(MIGRATION_V2).execute(pool).await?;
        record_migration(pool, 2).await?;
    }

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Check if the database needs migrations
pub async fn needs_migration(pool: &SqlitePool) -> anyhow::Result<bool> {
    let current_version = get_current_version(pool).await?;
    Ok(current_version < CURRENT_VERSION)
}

/// Get migration status information
pub async fn migration_status(pool: &SqlitePool) -> anyhow::Result<MigrationStatus> {
    let current_version = get_current_version(pool).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Current schema version in the database
    pub current_version: i32,
    /// Target schema version (latest)
    pub target_version: i32,
    /// Whether migrations need to be run
    pub needs_migration: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool")
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await;

        // Should start with no migrations
        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, 0);
        assert!(status.needs_migration);

        // Run migrations
        run_migrations(&pool).await.unwrap();

        // Should be at current version
        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
        assert!(!status.needs_migration);
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = create_test_pool().await;

        // Run migrations twice
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        // Should still be at current version
        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
    }

    #[tokio::test]
    async fn test_tables_created() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        for table in ["nodes", "edges", "captures_fts"] {
            let result: (i32,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&pool)
                .await
                .unwrap_or_else(|_| panic!("Table {} should exist", table));
            assert_eq!(result.0, 0, "Table {} should be empty", table);
        }
    }

    #[tokio::test]
    async fn test_edge_label_constrained() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        let result = sqlx::query(
            "INSERT INTO nodes (id, owner_id, label, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind("urn:weft:capture:x")
        .bind("urn:weft:user:u1")
        .bind("not-a-label")
        .bind("2026-01-01T00:00:00.000000+00:00")
        .execute(&pool)
        .await;

        assert!(result.is_err(), "Label CHECK constraint should reject unknown labels");
    }
}
