use anyhow::Result;
use chrono::Utc;
use libsql::Connection;

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i64 = 1;

/// Run database migrations
///
/// Safe to call from every writer on startup; applied versions are skipped.
pub async fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    let current_version = get_current_version(conn).await?;

    if current_version >= SCHEMA_VERSION {
        tracing::info!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    tracing::info!("Running migrations from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Create health_checks").await?;
    }

    tracing::info!("Database migrations completed successfully (now at version {})", SCHEMA_VERSION);
    Ok(())
}

/// Get current schema version from database
async fn get_current_version(conn: &Connection) -> Result<i64> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    if let Some(row) = rows.next().await? {
        let version: Option<i64> = row.get(0)?;
        Ok(version.unwrap_or(0))
    } else {
        Ok(0)
    }
}

async fn record_migration(conn: &Connection, version: i64, description: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, Utc::now().timestamp(), description],
    )
    .await?;

    tracing::info!("Applied migration v{}: {}", version, description);
    Ok(())
}

pub(crate) async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let mut rows = conn
        .query("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?", libsql::params![name])
        .await?;
    Ok(rows.next().await?.is_some())
}

/// Migration v1: the health_checks table
///
/// `id` is the primary key so a redelivered batch inserts nothing twice.
async fn run_migration_v1(conn: &Connection) -> Result<()> {
    if !table_exists(conn, "health_checks").await? {
        tracing::warn!("Table health_checks does not exist, creating it");
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS health_checks (
            id TEXT PRIMARY KEY,
            check_name TEXT NOT NULL,
            dt TEXT NOT NULL,
            health INTEGER NOT NULL,
            status INTEGER,
            duration REAL,
            length INTEGER,
            sample TEXT
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS health_checks_name_dt_idx ON health_checks (check_name, dt)",
        (),
    )
    .await?;

    Ok(())
}
