//! probe - HTTP health probes for healthwatch
//!
//! This library performs single HTTP requests against configured endpoints
//! and turns the raw outcome into a structured health verdict.

use std::time::Duration;

pub mod classify;
pub mod handlers;
pub mod protocol;
pub mod result;

// Re-export main types
pub use classify::{classify, Expectation};
pub use handlers::{validate_probe_request, HttpProbe, ValidationError};
pub use protocol::{BasicAuth, ProbeRequest, RawOutcome};
pub use result::CheckResult;

/// Re-export common error types
pub use anyhow;

/// Probe result type using anyhow for error handling
pub type Result<T> = anyhow::Result<T>;

/// Timeout applied when a check does not configure one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// User agent sent with every probe
pub const USER_AGENT: &str = concat!("healthwatch/", env!("CARGO_PKG_VERSION"));
