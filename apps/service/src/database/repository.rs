use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Row, params};
use probe::CheckResult;
use uuid::Uuid;

use crate::pool::{LibsqlManager, LibsqlPool};

const SELECT_COLUMNS: &str = "SELECT id, check_name, dt, health, status, duration, length, sample FROM health_checks";

/// Durable storage for check results
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Insert a batch atomically, skipping ids that are already stored.
    /// Returns the number of newly inserted rows.
    async fn insert_batch(&self, results: &[CheckResult]) -> Result<usize>;

    /// Get a stored result by id
    async fn get_record(&self, id: Uuid) -> Result<Option<CheckResult>>;

    /// Newest results of one check, newest first
    async fn recent_results(&self, check_name: &str, limit: usize) -> Result<Vec<CheckResult>>;

    /// Total number of stored results
    async fn count(&self) -> Result<u64>;
}

/// LibSQL result store
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        self.pool
            .get()
            .await
            .map_err(|error| anyhow::anyhow!("failed to get database connection: {error}"))
    }
}

/// Timestamps are stored as fixed-width RFC 3339 UTC text so they sort chronologically
pub(crate) fn format_dt(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_result(row: &Row) -> Result<CheckResult> {
    let id: String = row.get(0)?;
    let dt: String = row.get(2)?;
    let status: Option<i64> = row.get(4)?;
    let length: Option<i64> = row.get(6)?;

    Ok(CheckResult {
        id: Uuid::parse_str(&id).with_context(|| format!("stored id {id} is not a uuid"))?,
        check_name: row.get(1)?,
        dt: DateTime::parse_from_rfc3339(&dt)
            .with_context(|| format!("stored dt {dt} is not a timestamp"))?
            .with_timezone(&Utc),
        health: row.get::<i64>(3)? != 0,
        status: status.map(u16::try_from).transpose()?,
        duration: row.get(5)?,
        length: length.map(u64::try_from).transpose()?,
        sample: row.get(7)?,
    })
}

#[async_trait]
impl ResultStore for DatabaseImpl {
    async fn insert_batch(&self, results: &[CheckResult]) -> Result<usize> {
        let conn = self.get_conn().await?;
        let tx = conn.transaction().await?;

        let mut inserted = 0;
        for result in results {
            inserted += tx
                .execute(
                    "INSERT INTO health_checks (id, check_name, dt, health, status, duration, length, sample)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT (id) DO NOTHING",
                    params![
                        result.id.to_string(),
                        result.check_name.clone(),
                        format_dt(&result.dt),
                        result.health,
                        result.status.map(i64::from),
                        result.duration,
                        result.length.map(|length| length as i64),
                        result.sample.clone(),
                    ],
                )
                .await? as usize;
        }

        // Dropping the transaction on an earlier error rolls everything back
        tx.commit().await?;
        Ok(inserted)
    }

    async fn get_record(&self, id: Uuid) -> Result<Option<CheckResult>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(&format!("{SELECT_COLUMNS} WHERE id = ?"), params![id.to_string()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_result(&row)?)),
            None => Ok(None),
        }
    }

    async fn recent_results(&self, check_name: &str, limit: usize) -> Result<Vec<CheckResult>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!("{SELECT_COLUMNS} WHERE check_name = ? ORDER BY dt DESC LIMIT ?"),
                params![check_name, limit as i64],
            )
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(row_to_result(&row)?);
        }
        Ok(results)
    }

    async fn count(&self) -> Result<u64> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query("SELECT COUNT(*) FROM health_checks", ()).await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(count as u64)
    }
}
