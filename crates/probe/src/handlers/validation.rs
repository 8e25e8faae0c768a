//! Probe request validation.
//!
//! Checks are validated once when they are loaded, so a bad definition fails
//! the process at startup instead of producing unhealthy results forever.

use std::time::Duration;

use reqwest::Method;
use thiserror::Error;
use url::Url;

use crate::protocol::ProbeRequest;

const MIN_TIMEOUT: Duration = Duration::from_millis(100);
const MAX_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_HEADERS: usize = 20;
const MAX_HEADER_SIZE: usize = 8192;
const MAX_BODY_SIZE: usize = 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),
    #[error("Timeout too small: {0:?} (min: 100ms)")]
    TimeoutTooSmall(Duration),
    #[error("Timeout too large: {0:?} (max: 300s)")]
    TimeoutTooLarge(Duration),
    #[error("Too many headers: {0} (max: 20)")]
    TooManyHeaders(usize),
    #[error("Header too large: {0} bytes (max: 8192 bytes)")]
    HeaderTooLarge(usize),
    #[error("Body too large: {0} bytes (max: 1048576 bytes)")]
    BodyTooLarge(usize),
}

/// Validate a probe request
pub fn validate_probe_request(request: &ProbeRequest) -> Result<(), ValidationError> {
    validate_url(&request.target_url)?;
    parse_method(&request.method)?;
    validate_timeout(request.timeout)?;

    if let Some(headers) = &request.headers {
        validate_headers(headers)?;
    }

    if let Some(body) = &request.body {
        validate_body_size(body)?;
    }

    Ok(())
}

/// Map a configured method name onto a request method
pub(crate) fn parse_method(method: &str) -> Result<Method, ValidationError> {
    match method.to_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "DELETE" => Ok(Method::DELETE),
        "HEAD" => Ok(Method::HEAD),
        "OPTIONS" => Ok(Method::OPTIONS),
        "PATCH" => Ok(Method::PATCH),
        _ => Err(ValidationError::UnsupportedMethod(method.to_string())),
    }
}

fn validate_url(url: &str) -> Result<(), ValidationError> {
    let parsed = Url::parse(url)
        .map_err(|e| ValidationError::InvalidUrl { url: url.to_string(), reason: e.to_string() })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ValidationError::UnsupportedScheme(other.to_string())),
    }
}

fn validate_timeout(timeout: Duration) -> Result<(), ValidationError> {
    if timeout < MIN_TIMEOUT {
        return Err(ValidationError::TimeoutTooSmall(timeout));
    }

    if timeout > MAX_TIMEOUT {
        return Err(ValidationError::TimeoutTooLarge(timeout));
    }

    Ok(())
}

fn validate_headers(headers: &[(String, String)]) -> Result<(), ValidationError> {
    if headers.len() > MAX_HEADERS {
        return Err(ValidationError::TooManyHeaders(headers.len()));
    }

    for (key, value) in headers {
        if key.len() + value.len() > MAX_HEADER_SIZE {
            return Err(ValidationError::HeaderTooLarge(key.len() + value.len()));
        }
    }

    Ok(())
}

fn validate_body_size(body: &str) -> Result<(), ValidationError> {
    if body.len() > MAX_BODY_SIZE {
        return Err(ValidationError::BodyTooLarge(body.len()));
    }

    Ok(())
}
