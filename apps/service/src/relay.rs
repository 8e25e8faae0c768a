//! Moves check results from the broker into storage.
//!
//! Each batch is stored in one transaction before its offset is committed.
//! A crash between the two redelivers the batch, and the idempotent insert
//! makes the second delivery a no-op.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use probe::CheckResult;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::broker::{Consumer, Message};
use crate::database::ResultStore;
use crate::error::RelayError;
use crate::timestamp::parse_timestamp;

/// Pause after a failed batch before polling again
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Why a message was dropped
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedMessage {
    #[error("payload is not a JSON record: {0}")]
    InvalidJson(String),

    #[error("mandatory field {0} is missing")]
    MissingField(&'static str),

    #[error("field {field} is invalid: {value}")]
    InvalidField { field: &'static str, value: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatusRepr {
    Number(u16),
    Text(String),
}

/// Older producers sent the status as a string
fn status_from_number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u16>, D::Error> {
    match Option::<StatusRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StatusRepr::Number(status)) => Ok(Some(status)),
        Some(StatusRepr::Text(text)) => text.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
struct InboundRecord {
    id: Option<String>,
    check_name: Option<String>,
    dt: Option<String>,
    health: Option<bool>,
    #[serde(default, deserialize_with = "status_from_number_or_string")]
    status: Option<u16>,
    duration: Option<f64>,
    length: Option<u64>,
    sample: Option<String>,
}

/// Decode one message into a result.
///
/// `id`, `check_name`, `dt` and `health` are mandatory; missing optional
/// fields stay absent.
pub fn parse_message(message: &Message) -> Result<CheckResult, MalformedMessage> {
    let record: InboundRecord = serde_json::from_slice(&message.payload)
        .map_err(|error| MalformedMessage::InvalidJson(error.to_string()))?;

    let id = record.id.ok_or(MalformedMessage::MissingField("id"))?;
    let check_name = record.check_name.ok_or(MalformedMessage::MissingField("check_name"))?;
    let dt = record.dt.ok_or(MalformedMessage::MissingField("dt"))?;
    let health = record.health.ok_or(MalformedMessage::MissingField("health"))?;

    Ok(CheckResult {
        id: Uuid::parse_str(&id).map_err(|_| MalformedMessage::InvalidField { field: "id", value: id.clone() })?,
        check_name,
        dt: parse_timestamp(&dt).ok_or_else(|| MalformedMessage::InvalidField { field: "dt", value: dt.clone() })?,
        health,
        status: record.status,
        duration: record.duration,
        length: record.length,
        sample: record.sample,
    })
}

/// Outcome of one `write_once`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Messages polled
    pub received: usize,
    /// Rows newly inserted; redelivered results are not counted again
    pub written: usize,
    /// Malformed messages skipped
    pub dropped: usize,
}

/// Totals over the lifetime of `write_forever`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub batches: u64,
    pub written: u64,
    pub dropped: u64,
    pub failures: u64,
}

pub struct ResultRelay<C: Consumer> {
    consumer: C,
    store: Arc<dyn ResultStore>,
    poll_timeout: Duration,
}

impl<C: Consumer> ResultRelay<C> {
    pub fn new(consumer: C, store: Arc<dyn ResultStore>, poll_timeout: Duration) -> Self {
        Self { consumer, store, poll_timeout }
    }

    pub fn into_consumer(self) -> C {
        self.consumer
    }

    /// Poll one batch, store it, then commit its offset.
    ///
    /// Nothing is committed when storage fails; the consumer is rewound so
    /// the batch is delivered again.
    pub async fn write_once(&mut self) -> Result<BatchReport, RelayError> {
        let messages = self.consumer.poll(self.poll_timeout).await.map_err(RelayError::Poll)?;
        if messages.is_empty() {
            return Ok(BatchReport::default());
        }
        debug!(count = messages.len(), "got batch");

        let mut records = Vec::with_capacity(messages.len());
        let mut dropped = 0;
        for message in &messages {
            match parse_message(message) {
                Ok(record) => records.push(record),
                Err(reason) => {
                    dropped += 1;
                    warn!(
                        offset = message.offset,
                        %reason,
                        payload = %String::from_utf8_lossy(&message.payload),
                        "skip message"
                    );
                }
            }
        }

        let written = if records.is_empty() {
            0
        } else {
            match self.store.insert_batch(&records).await {
                Ok(written) => written,
                Err(error) => {
                    if let Err(seek_error) = self.consumer.seek_to_committed().await {
                        error!(%seek_error, "failed to rewind consumer");
                    }
                    return Err(RelayError::Store(error));
                }
            }
        };

        self.consumer.commit().await.map_err(RelayError::Commit)?;

        let report = BatchReport { received: messages.len(), written, dropped };
        debug!(received = report.received, written = report.written, dropped = report.dropped, "batch persisted");
        Ok(report)
    }

    /// Relay batches until `shutdown` resolves.
    ///
    /// A failed batch is logged and retried through redelivery; shutdown is
    /// only observed between batches.
    pub async fn write_forever<F>(&mut self, shutdown: F) -> RelayStats
    where
        F: Future<Output = ()>,
    {
        let mut shutdown = pin!(shutdown);
        let mut stats = RelayStats::default();

        loop {
            match self.write_once().await {
                Ok(report) if report.received > 0 => {
                    stats.batches += 1;
                    stats.written += report.written as u64;
                    stats.dropped += report.dropped as u64;
                }
                Ok(_) => {}
                Err(error) => {
                    stats.failures += 1;
                    match &error {
                        RelayError::Store(_) => error!(%error, "batch not stored, it will be redelivered"),
                        RelayError::Commit(_) => warn!(%error, "batch stored, offset will be committed with the next batch"),
                        RelayError::Poll(_) => warn!(%error, "poll failed, retrying"),
                    }
                    tokio::select! {
                        biased;
                        _ = shutdown.as_mut() => break,
                        _ = sleep(RETRY_DELAY) => {}
                    }
                    continue;
                }
            }

            if futures::poll!(shutdown.as_mut()).is_ready() {
                break;
            }
        }

        info!(batches = stats.batches, written = stats.written, dropped = stats.dropped, "relay stopped");
        stats
    }
}
