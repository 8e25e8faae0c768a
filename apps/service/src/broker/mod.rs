//! Message queue between the checker and the writer.
//!
//! The relay and the publisher only see the [`Producer`] and [`Consumer`]
//! traits; [`LogBroker`] is the libsql-backed topic log behind them.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

pub mod topic_log;
pub mod publisher;

pub use topic_log::{LogBroker, LogConsumer, LogProducer};
pub use publisher::{PublishStats, ResultPublisher};

/// One record read from a topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    /// Position in the topic, strictly increasing
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    /// Append time, unix milliseconds
    pub timestamp: i64,
}

#[async_trait]
pub trait Producer: Send + Sync {
    /// Append a message and return its offset
    async fn send(&self, topic: &str, key: Option<&str>, payload: &[u8]) -> Result<i64>;

    /// Wait until everything sent so far is durable
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait Consumer: Send {
    /// Fetch the next batch after the current position, waiting up to
    /// `timeout` for one to arrive. An empty batch is not an error.
    async fn poll(&mut self, timeout: Duration) -> Result<Vec<Message>>;

    /// Persist the current position for the consumer group
    async fn commit(&mut self) -> Result<()>;

    /// Forget uncommitted progress so the next poll redelivers it
    async fn seek_to_committed(&mut self) -> Result<()>;
}
