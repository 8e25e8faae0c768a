//! Fire-and-forget publication of check results.

use std::sync::Arc;

use anyhow::Result;
use probe::CheckResult;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use super::Producer;
use crate::error::PublishError;

/// Delivery counters, reported when the publisher closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub sent: u64,
    pub failed: u64,
}

enum Command {
    Publish(CheckResult),
    Close(oneshot::Sender<PublishStats>),
}

/// Queues results for a background task that sends them to the broker.
///
/// [`publish`](Self::publish) never waits on the broker. Results queued
/// before [`close`](Self::close) are all delivered before it returns.
#[derive(Clone)]
pub struct ResultPublisher {
    tx: mpsc::UnboundedSender<Command>,
}

impl ResultPublisher {
    /// Start the delivery task on the current runtime
    pub fn spawn(producer: Arc<dyn Producer>, topic: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(deliver(producer, topic.into(), rx));
        Self { tx }
    }

    pub fn publish(&self, result: CheckResult) -> Result<(), PublishError> {
        self.tx.send(Command::Publish(result)).map_err(|_| PublishError::Closed)
    }

    /// Deliver everything queued, flush the producer and stop the task
    pub async fn close(&self) -> Result<PublishStats, PublishError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx.send(Command::Close(ack_tx)).map_err(|_| PublishError::Closed)?;
        ack_rx.await.map_err(|_| PublishError::Closed)
    }
}

async fn send_result(producer: &dyn Producer, topic: &str, result: &CheckResult) -> Result<i64> {
    let payload = serde_json::to_vec(result)?;
    producer.send(topic, Some(&result.id.to_string()), &payload).await
}

async fn deliver(producer: Arc<dyn Producer>, topic: String, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut stats = PublishStats::default();
    let mut closing = Vec::new();

    while let Some(command) = rx.recv().await {
        match command {
            Command::Publish(result) => match send_result(producer.as_ref(), &topic, &result).await {
                Ok(offset) => {
                    stats.sent += 1;
                    debug!(id = %result.id, check = %result.check_name, offset, "published check result");
                }
                Err(error) => {
                    stats.failed += 1;
                    error!(id = %result.id, check = %result.check_name, %error, "failed to publish check result");
                }
            },
            Command::Close(ack) => {
                // Refuse new results; whatever is already buffered is still delivered
                rx.close();
                closing.push(ack);
            }
        }
    }

    if let Err(error) = producer.flush().await {
        error!(%error, "failed to flush producer");
    }

    debug!(sent = stats.sent, failed = stats.failed, "publisher closed");
    for ack in closing {
        let _ = ack.send(stats);
    }
}
