use std::time::Duration;

use anyhow::{Context, Result};
use deadpool::managed::{self, Pool, RecycleResult};
use libsql::{Builder, Connection, Database, Error as LibsqlError};
use tracing::debug;

/// How long a local connection waits on a lock held by the other process
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct LibsqlManager {
    database: Database,
    local: bool,
}

impl LibsqlManager {
    pub fn new(database: Database, local: bool) -> Self {
        Self { database, local }
    }
}

impl managed::Manager for LibsqlManager {
    type Type = Connection;
    type Error = LibsqlError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        let conn = self.database.connect()?;
        if self.local {
            // Checker and writer share the file; wait instead of failing on SQLITE_BUSY
            conn.busy_timeout(BUSY_TIMEOUT)?;
        }
        Ok(conn)
    }

    async fn recycle(&self, conn: &mut Self::Type, _: &managed::Metrics) -> RecycleResult<Self::Error> {
        conn.query("SELECT 1", ())
            .await?
            .next()
            .await?
            .ok_or(LibsqlError::QueryReturnedNoRows)?;
        Ok(())
    }
}

pub type LibsqlPool = Pool<LibsqlManager>;

/// Remote urls go to a libsql server, anything else is a local file path
pub fn is_remote(url: &str) -> bool {
    ["libsql://", "http://", "https://", "ws://", "wss://"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

/// Open `url` and build a pool over it, failing fast when it is unreachable
pub async fn connect_pool(url: &str, auth_token: Option<&str>, max_size: usize) -> Result<LibsqlPool> {
    let local = !is_remote(url);
    let database = if local {
        Builder::new_local(url).build().await
    } else {
        Builder::new_remote(url.to_string(), auth_token.unwrap_or_default().to_string())
            .build()
            .await
    }
    .with_context(|| format!("failed to open database {url}"))?;

    let pool: LibsqlPool = Pool::builder(LibsqlManager::new(database, local))
        .max_size(max_size.max(1))
        .build()
        .context("failed to build connection pool")?;

    let conn: managed::Object<LibsqlManager> = pool
        .get()
        .await
        .map_err(|error| anyhow::anyhow!("failed to connect to {url}: {error}"))?;
    conn.query("SELECT 1", ()).await.with_context(|| format!("database {url} is not responding"))?;

    debug!(url, local, max_size, "connection pool ready");
    Ok(pool)
}
