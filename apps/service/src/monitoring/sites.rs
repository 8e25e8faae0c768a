//! Loading check definitions from a sites file.
//!
//! The file maps check names to their settings:
//!
//! ```json
//! {
//!   "api": {
//!     "url": "https://api.example.com/health",
//!     "minutes": 1,
//!     "status": 200,
//!     "regexp": "(?<=version:)\\d+"
//!   }
//! }
//! ```
//!
//! Files ending in `.toml` hold the same structure as TOML tables.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use fancy_regex::Regex;
use probe::{BasicAuth, Expectation, ProbeRequest, validate_probe_request};
use serde::Deserialize;

use super::types::{CheckDefinition, Recurrence};
use crate::error::ConfigError;
use crate::timestamp::parse_timestamp;

/// Interval used when no recurrence field is set
const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitesFormat {
    Json,
    Toml,
}

impl SitesFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SiteEntry {
    url: String,
    method: Option<String>,
    /// Seconds
    timeout: Option<f64>,
    status: Option<u16>,
    regexp: Option<String>,
    headers: Option<BTreeMap<String, String>>,
    /// `[user]` or `[user, password]`
    auth: Option<Vec<String>>,
    data: Option<String>,
    weeks: Option<f64>,
    days: Option<f64>,
    hours: Option<f64>,
    minutes: Option<f64>,
    seconds: Option<f64>,
    start_date: Option<String>,
    end_date: Option<String>,
    /// Seconds
    jitter: Option<f64>,
}

/// Read and validate every check in `path`
pub fn load_sites_file(path: &Path, default_timeout: Duration) -> Result<Vec<CheckDefinition>, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFailed { path: path.to_path_buf(), source })?;

    parse_sites(&raw, SitesFormat::from_path(path), default_timeout).map_err(|error| match error {
        ConfigError::ParseFailed { reason, .. } => ConfigError::ParseFailed { path: path.to_path_buf(), reason },
        other => other,
    })
}

/// Parse and validate check definitions, ordered by name
pub fn parse_sites(
    raw: &str,
    format: SitesFormat,
    default_timeout: Duration,
) -> Result<Vec<CheckDefinition>, ConfigError> {
    let entries: BTreeMap<String, SiteEntry> = match format {
        SitesFormat::Json => serde_json::from_str(raw).map_err(|err| err.to_string()),
        SitesFormat::Toml => toml::from_str(raw).map_err(|err| err.to_string()),
    }
    .map_err(|reason| ConfigError::ParseFailed { path: "<sites>".into(), reason })?;

    entries
        .into_iter()
        .map(|(name, entry)| build_definition(name, entry, default_timeout))
        .collect()
}

fn seconds(name: &str, field: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidCheck {
        name: name.to_string(),
        reason: format!("{field} must be a non-negative number of seconds, got {value}"),
    })
}

fn recurrence(name: &str, entry: &SiteEntry) -> Result<Recurrence, ConfigError> {
    let units = [
        ("weeks", entry.weeks, 7.0 * 86400.0),
        ("days", entry.days, 86400.0),
        ("hours", entry.hours, 3600.0),
        ("minutes", entry.minutes, 60.0),
        ("seconds", entry.seconds, 1.0),
    ];

    let mut interval = Duration::ZERO;
    for (field, value, scale) in units {
        if let Some(value) = value {
            interval = interval
                .checked_add(seconds(name, field, value * scale)?)
                .ok_or_else(|| ConfigError::InvalidCheck {
                    name: name.to_string(),
                    reason: "interval is too large".to_string(),
                })?;
        }
    }
    if interval.is_zero() {
        interval = DEFAULT_INTERVAL;
    }

    let date = |field: &str, value: &Option<String>| {
        value
            .as_deref()
            .map(|raw| {
                parse_timestamp(raw).ok_or_else(|| ConfigError::InvalidCheck {
                    name: name.to_string(),
                    reason: format!("{field} {raw:?} is not a date"),
                })
            })
            .transpose()
    };

    let start = date("start_date", &entry.start_date)?;
    let end = date("end_date", &entry.end_date)?;
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(ConfigError::InvalidCheck {
                name: name.to_string(),
                reason: "end_date is before start_date".to_string(),
            });
        }
    }

    let jitter = entry.jitter.map(|value| seconds(name, "jitter", value)).transpose()?;

    Ok(Recurrence { interval, start, end, jitter: jitter.filter(|jitter| !jitter.is_zero()) })
}

fn build_definition(name: String, entry: SiteEntry, default_timeout: Duration) -> Result<CheckDefinition, ConfigError> {
    let recurrence = recurrence(&name, &entry)?;

    let mut request = ProbeRequest::new(entry.url);
    if let Some(method) = entry.method {
        request = request.with_method(method.to_uppercase());
    }
    request = request.with_timeout(match entry.timeout {
        Some(timeout) => seconds(&name, "timeout", timeout)?,
        None => default_timeout,
    });
    for (header, value) in entry.headers.unwrap_or_default() {
        request = request.with_header(header, value);
    }
    if let Some(auth) = entry.auth {
        let mut parts = auth.into_iter();
        request.auth = match (parts.next(), parts.next(), parts.next()) {
            (Some(username), password, None) => Some(BasicAuth { username, password }),
            _ => {
                return Err(ConfigError::InvalidCheck {
                    name,
                    reason: "auth must be [user] or [user, password]".to_string(),
                });
            }
        };
    }
    if let Some(data) = entry.data {
        request = request.with_body(data);
    }

    if let Err(source) = validate_probe_request(&request) {
        return Err(ConfigError::InvalidRequest { name, source });
    }

    let pattern = match entry.regexp.filter(|pattern| !pattern.is_empty()) {
        Some(pattern) => match Regex::new(&pattern) {
            Ok(regex) => Some(regex),
            Err(source) => return Err(ConfigError::InvalidPattern { name, source: Box::new(source) }),
        },
        None => None,
    };

    Ok(CheckDefinition {
        name,
        request,
        expectation: Expectation::new(entry.status, pattern),
        recurrence,
    })
}
