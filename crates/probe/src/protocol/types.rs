//! Probe type definitions.
//!
//! A [`ProbeRequest`] describes one HTTP call; a [`RawOutcome`] is what came
//! back before any health judgement was made.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DEFAULT_TIMEOUT;

/// HTTP basic credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: Option<String>,
}

/// A single HTTP probe to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    /// The URL to probe
    pub target_url: String,

    /// The HTTP method to use (GET, POST, etc.)
    pub method: String,

    /// Deadline for the whole exchange, response body included
    pub timeout: Duration,

    /// Optional request body
    pub body: Option<String>,

    /// Optional request headers
    pub headers: Option<Vec<(String, String)>>,

    /// Optional basic auth credentials
    pub auth: Option<BasicAuth>,
}

impl ProbeRequest {
    /// A GET request with the default timeout
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            method: "GET".to_string(),
            timeout: DEFAULT_TIMEOUT,
            body: None,
            headers: None,
            auth: None,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.get_or_insert_with(Vec::new).push((name.into(), value.into()));
        self
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.auth = Some(BasicAuth { username: username.into(), password });
        self
    }
}

/// Raw result of one HTTP attempt.
///
/// `status` and `body` are both absent when the request timed out or failed
/// at the transport level. That is an outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutcome {
    pub status: Option<u16>,
    pub body: Option<String>,
    /// Wall-clock time the request was issued
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl RawOutcome {
    /// A response was received and fully read
    pub fn response(status: u16, body: String, started_at: DateTime<Utc>, elapsed: Duration) -> Self {
        Self { status: Some(status), body: Some(body), started_at, elapsed }
    }

    /// Timeout, connection error or unreadable body
    pub fn failed(started_at: DateTime<Utc>, elapsed: Duration) -> Self {
        Self { status: None, body: None, started_at, elapsed }
    }

    pub fn is_transport_failure(&self) -> bool {
        self.status.is_none()
    }
}
