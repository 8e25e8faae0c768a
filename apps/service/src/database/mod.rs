//! Result storage
//!
//! Check results land in the `health_checks` table of a libsql database,
//! either a local file or a remote libsql server.

pub mod migrations;
pub mod repository;

pub use repository::{DatabaseImpl, ResultStore};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
