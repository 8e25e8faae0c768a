//! Durable topic log on libsql.
//!
//! Messages are appended to `broker_messages` with an autoincrement sequence
//! that doubles as the offset. Each consumer group keeps its committed offset
//! in `broker_offsets`; nothing is ever committed implicitly.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, params};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use super::{Consumer, Message, Producer};
use crate::pool::{self, LibsqlManager, LibsqlPool};

/// Gap between fetches while a poll waits for new messages
const FETCH_INTERVAL: Duration = Duration::from_millis(100);

/// Handle on the topic log database
#[derive(Clone)]
pub struct LogBroker {
    pool: LibsqlPool,
}

impl LogBroker {
    /// Connect to the log at `url`, creating its tables if needed
    pub async fn connect(url: &str, auth_token: Option<&str>) -> Result<Self> {
        let pool = pool::connect_pool(url, auth_token, 4).await?;
        let broker = Self::from_pool(pool);
        broker.initialize().await?;
        info!(url, "connected to broker");
        Ok(broker)
    }

    pub fn from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        get_conn(&self.pool).await
    }

    /// Create the log tables
    pub async fn initialize(&self) -> Result<()> {
        let conn = self.get_conn().await?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS broker_topics (
                name TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS broker_messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                topic TEXT NOT NULL,
                key TEXT,
                payload BLOB NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS broker_messages_topic_seq_idx ON broker_messages (topic, seq);
            CREATE TABLE IF NOT EXISTS broker_offsets (
                group_id TEXT NOT NULL,
                topic TEXT NOT NULL,
                committed INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (group_id, topic)
            );",
        )
        .await?;
        Ok(())
    }

    /// Create `topic` unless it exists. Returns whether it was created.
    pub async fn create_topic_if_not_exists(&self, topic: &str) -> Result<bool> {
        let conn = self.get_conn().await?;
        let created = conn
            .execute(
                "INSERT INTO broker_topics (name, created_at) VALUES (?, ?) ON CONFLICT (name) DO NOTHING",
                params![topic, Utc::now().timestamp_millis()],
            )
            .await?
            > 0;

        if created {
            warn!(topic, "topic does not exist, created it");
        }
        Ok(created)
    }

    pub async fn list_topics(&self) -> Result<Vec<String>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query("SELECT name FROM broker_topics ORDER BY name", ()).await?;

        let mut topics = Vec::new();
        while let Some(row) = rows.next().await? {
            topics.push(row.get::<String>(0)?);
        }
        Ok(topics)
    }

    pub fn producer(&self) -> LogProducer {
        LogProducer { pool: self.pool.clone() }
    }

    /// Consumer in `group_id` reading `topic` from the group's committed offset
    pub fn consumer(&self, group_id: &str, client_id: &str, topic: &str, max_poll_records: usize) -> LogConsumer {
        LogConsumer {
            pool: self.pool.clone(),
            group_id: group_id.to_string(),
            client_id: client_id.to_string(),
            topic: topic.to_string(),
            max_poll_records: max_poll_records.max(1),
            position: None,
        }
    }
}

async fn get_conn(pool: &LibsqlPool) -> Result<deadpool::managed::Object<LibsqlManager>> {
    pool.get().await.map_err(|error| anyhow::anyhow!("failed to get broker connection: {error}"))
}

pub struct LogProducer {
    pool: LibsqlPool,
}

#[async_trait]
impl Producer for LogProducer {
    async fn send(&self, topic: &str, key: Option<&str>, payload: &[u8]) -> Result<i64> {
        let conn = get_conn(&self.pool).await?;
        conn.execute(
            "INSERT INTO broker_messages (topic, key, payload, created_at) VALUES (?, ?, ?, ?)",
            params![topic, key, payload, Utc::now().timestamp_millis()],
        )
        .await?;
        Ok(conn.last_insert_rowid())
    }
}

pub struct LogConsumer {
    pool: LibsqlPool,
    group_id: String,
    client_id: String,
    topic: String,
    max_poll_records: usize,
    /// Offset of the last message handed out; `None` until the first poll
    position: Option<i64>,
}

impl LogConsumer {
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Committed offset of this group, 0 (earliest) when nothing was committed
    pub async fn committed(&self) -> Result<i64> {
        let conn = get_conn(&self.pool).await?;
        let mut rows = conn
            .query(
                "SELECT committed FROM broker_offsets WHERE group_id = ? AND topic = ?",
                params![self.group_id.as_str(), self.topic.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?),
            None => Ok(0),
        }
    }

    async fn fetch(&self, conn: &Connection, after: i64) -> Result<Vec<Message>> {
        let mut rows = conn
            .query(
                "SELECT seq, topic, key, payload, created_at FROM broker_messages
                 WHERE topic = ? AND seq > ? ORDER BY seq LIMIT ?",
                params![self.topic.as_str(), after, self.max_poll_records as i64],
            )
            .await?;

        let mut messages = Vec::new();
        while let Some(row) = rows.next().await? {
            messages.push(Message {
                offset: row.get(0)?,
                topic: row.get(1)?,
                key: row.get(2)?,
                payload: row.get(3)?,
                timestamp: row.get(4)?,
            });
        }
        Ok(messages)
    }
}

#[async_trait]
impl Consumer for LogConsumer {
    async fn poll(&mut self, timeout: Duration) -> Result<Vec<Message>> {
        let position = match self.position {
            Some(position) => position,
            None => {
                let committed = self.committed().await?;
                debug!(client = %self.client_id, group = %self.group_id, topic = %self.topic, committed, "starting from committed offset");
                self.position = Some(committed);
                committed
            }
        };

        let deadline = Instant::now() + timeout;
        let conn = get_conn(&self.pool).await?;

        loop {
            let messages = self.fetch(&conn, position).await?;
            if let Some(last) = messages.last() {
                self.position = Some(last.offset);
                return Ok(messages);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(messages);
            }
            sleep(FETCH_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn commit(&mut self) -> Result<()> {
        let Some(position) = self.position else {
            return Ok(());
        };

        let conn = get_conn(&self.pool).await?;
        conn.execute(
            "INSERT INTO broker_offsets (group_id, topic, committed, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (group_id, topic) DO UPDATE SET committed = excluded.committed, updated_at = excluded.updated_at",
            params![self.group_id.as_str(), self.topic.as_str(), position, Utc::now().timestamp_millis()],
        )
        .await?;

        debug!(client = %self.client_id, group = %self.group_id, topic = %self.topic, offset = position, "committed offset");
        Ok(())
    }

    async fn seek_to_committed(&mut self) -> Result<()> {
        self.position = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_broker;

    const TOPIC: &str = "health_checker";

    async fn send_all(broker: &LogBroker, payloads: &[&str]) {
        let producer = broker.producer();
        for payload in payloads {
            producer.send(TOPIC, None, payload.as_bytes()).await.unwrap();
        }
    }

    fn payloads(messages: &[Message]) -> Vec<String> {
        messages
            .iter()
            .map(|m| String::from_utf8(m.payload.clone()).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_create_topic_if_not_exists() {
        let (_dir, broker) = test_broker().await;

        assert!(broker.create_topic_if_not_exists(TOPIC).await.unwrap());
        assert!(!broker.create_topic_if_not_exists(TOPIC).await.unwrap());
        assert_eq!(broker.list_topics().await.unwrap(), [TOPIC]);
    }

    #[tokio::test]
    async fn test_poll_returns_messages_in_order() {
        let (_dir, broker) = test_broker().await;
        send_all(&broker, &["a", "b", "c"]).await;

        let mut consumer = broker.consumer("group", "client", TOPIC, 10);
        let batch = consumer.poll(Duration::from_millis(50)).await.unwrap();

        assert_eq!(payloads(&batch), ["a", "b", "c"]);
        assert!(batch.windows(2).all(|w| w[0].offset < w[1].offset));
        assert!(consumer.poll(Duration::from_millis(50)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_poll_respects_max_records() {
        let (_dir, broker) = test_broker().await;
        send_all(&broker, &["a", "b", "c"]).await;

        let mut consumer = broker.consumer("group", "client", TOPIC, 2);
        assert_eq!(payloads(&consumer.poll(Duration::ZERO).await.unwrap()), ["a", "b"]);
        assert_eq!(payloads(&consumer.poll(Duration::ZERO).await.unwrap()), ["c"]);
    }

    #[tokio::test]
    async fn test_poll_ignores_other_topics() {
        let (_dir, broker) = test_broker().await;
        broker.producer().send("other", None, b"x").await.unwrap();
        send_all(&broker, &["a"]).await;

        let mut consumer = broker.consumer("group", "client", TOPIC, 10);
        let batch = consumer.poll(Duration::ZERO).await.unwrap();
        assert_eq!(payloads(&batch), ["a"]);
        assert_eq!(batch[0].topic, TOPIC);
    }

    #[tokio::test]
    async fn test_poll_waits_for_late_message() {
        let (_dir, broker) = test_broker().await;
        let mut consumer = broker.consumer("group", "client", TOPIC, 10);

        let late = broker.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(150)).await;
            late.producer().send(TOPIC, Some("k"), b"late").await.unwrap();
        });

        let batch = consumer.poll(Duration::from_secs(5)).await.unwrap();
        assert_eq!(payloads(&batch), ["late"]);
        assert_eq!(batch[0].key.as_deref(), Some("k"));
    }

    #[tokio::test]
    async fn test_uncommitted_messages_are_redelivered() {
        let (_dir, broker) = test_broker().await;
        send_all(&broker, &["a", "b"]).await;

        let mut consumer = broker.consumer("group", "client", TOPIC, 10);
        assert_eq!(consumer.poll(Duration::ZERO).await.unwrap().len(), 2);

        // A new member of the group starts from the committed offset
        let mut restarted = broker.consumer("group", "client", TOPIC, 10);
        assert_eq!(payloads(&restarted.poll(Duration::ZERO).await.unwrap()), ["a", "b"]);

        consumer.seek_to_committed().await.unwrap();
        assert_eq!(payloads(&consumer.poll(Duration::ZERO).await.unwrap()), ["a", "b"]);
    }

    #[tokio::test]
    async fn test_commit_persists_group_position() {
        let (_dir, broker) = test_broker().await;
        send_all(&broker, &["a", "b"]).await;

        let mut consumer = broker.consumer("group", "client", TOPIC, 10);
        let batch = consumer.poll(Duration::ZERO).await.unwrap();
        consumer.commit().await.unwrap();
        assert_eq!(consumer.committed().await.unwrap(), batch[1].offset);

        send_all(&broker, &["c"]).await;
        let mut restarted = broker.consumer("group", "client", TOPIC, 10);
        assert_eq!(payloads(&restarted.poll(Duration::ZERO).await.unwrap()), ["c"]);

        // Other groups keep their own position
        let mut other = broker.consumer("other-group", "client", TOPIC, 10);
        assert_eq!(payloads(&other.poll(Duration::ZERO).await.unwrap()), ["a", "b", "c"]);
    }
}
