//! Health classification of raw probe outcomes.

use chrono::{DateTime, Utc};
use fancy_regex::Regex;
use tracing::warn;
use uuid::Uuid;

use crate::protocol::RawOutcome;
use crate::result::CheckResult;

/// What a check expects from a response.
///
/// With no `status` any received status is acceptable and the verdict is
/// governed by `pattern` alone. The pattern is compiled once, when the check
/// is loaded.
#[derive(Debug, Clone, Default)]
pub struct Expectation {
    pub status: Option<u16>,
    pub pattern: Option<Regex>,
}

impl Expectation {
    pub fn new(status: Option<u16>, pattern: Option<Regex>) -> Self {
        Self { status, pattern }
    }

    /// Expect an exact status code and nothing else
    pub fn status(status: u16) -> Self {
        Self { status: Some(status), pattern: None }
    }

    /// Compile `pattern` and expect it to be found in the body
    pub fn pattern(pattern: &str) -> Result<Self, fancy_regex::Error> {
        Ok(Self { status: None, pattern: Some(Regex::new(pattern)?) })
    }

    /// A missing status never matches, even when no status is expected
    pub fn status_matches(&self, status: Option<u16>) -> bool {
        match (status, self.status) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(got), Some(expected)) => got == expected,
        }
    }
}

/// Turn a raw outcome into a health verdict.
///
/// Healthy when the status matches and, if a pattern is configured, the
/// pattern is found in a non-empty body. The first match becomes the sample.
pub fn classify(
    check_name: &str,
    req_id: Uuid,
    req_start: DateTime<Utc>,
    expectation: &Expectation,
    raw: &RawOutcome,
) -> CheckResult {
    let duration = (Utc::now() - req_start).num_microseconds().unwrap_or_default().max(0) as f64 / 1e6;
    let length = raw.body.as_ref().map(|body| body.chars().count() as u64);

    let mut health = false;
    let mut sample = None;

    if expectation.status_matches(raw.status) {
        match (&expectation.pattern, raw.body.as_deref()) {
            (None, _) => health = true,
            (Some(pattern), Some(body)) if !body.is_empty() => {
                sample = search(check_name, pattern, body);
                health = sample.is_some();
            }
            (Some(_), _) => {}
        }
    }

    CheckResult {
        id: req_id,
        check_name: check_name.to_string(),
        dt: req_start,
        health,
        status: raw.status,
        duration: Some(duration),
        length,
        sample,
    }
}

fn search(check_name: &str, pattern: &Regex, body: &str) -> Option<String> {
    match pattern.find(body) {
        Ok(found) => found.map(|m| m.as_str().to_string()),
        Err(error) => {
            // Backtracking limit hit; count it as not found
            warn!(check = check_name, pattern = pattern.as_str(), %error, "pattern search failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_match_rules() {
        let any = Expectation::default();
        assert!(any.status_matches(Some(500)));
        assert!(!any.status_matches(None));

        let ok = Expectation::status(200);
        assert!(ok.status_matches(Some(200)));
        assert!(!ok.status_matches(Some(201)));
        assert!(!ok.status_matches(None));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(Expectation::pattern("(unclosed").is_err());
    }
}
