//! HTTP probe request execution.

use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use tracing::debug;

use crate::handlers::validation::parse_method;
use crate::protocol::{ProbeRequest, RawOutcome};
use crate::USER_AGENT;

/// Executes probe requests over a shared connection pool
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    /// Create a new executor. Timeouts are applied per request.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self { client })
    }

    /// Perform exactly one request.
    ///
    /// Timeouts and transport errors are reported as an outcome without
    /// status or body. Nothing is retried here; the next scheduled run is the
    /// retry.
    pub async fn execute(&self, check_name: &str, req_id: &str, request: &ProbeRequest) -> RawOutcome {
        let started_at = Utc::now();
        let start = Instant::now();

        debug!(check = check_name, id = req_id, url = %request.target_url, "start request");

        match perform_http_request(&self.client, request).await {
            Ok((status, text)) => {
                debug!(check = check_name, id = req_id, status, url = %request.target_url, "finish request");
                RawOutcome::response(status, text, started_at, start.elapsed())
            }
            Err(error) => {
                debug!(check = check_name, id = req_id, url = %request.target_url, %error, "request failed");
                RawOutcome::failed(started_at, start.elapsed())
            }
        }
    }
}

/// Perform the actual HTTP request and read the whole body as text
pub async fn perform_http_request(client: &reqwest::Client, request: &ProbeRequest) -> Result<(u16, String)> {
    let method = parse_method(&request.method)?;

    let mut http_request = client.request(method, &request.target_url).timeout(request.timeout);

    if let Some(headers) = &request.headers {
        for (key, value) in headers {
            http_request = http_request.header(key, value);
        }
    }

    if let Some(auth) = &request.auth {
        http_request = http_request.basic_auth(&auth.username, auth.password.as_ref());
    }

    if let Some(body) = &request.body {
        http_request = http_request.body(body.clone());
    }

    let response = http_request.send().await?;
    let status = response.status().as_u16();

    // The timeout covers the body as well, so a stalled body is a failure too
    let text = response.text().await?;

    Ok((status, text))
}
