use std::time::Duration;

use chrono::{DateTime, Utc};
use probe::{Expectation, ProbeRequest};

/// When a check runs
#[derive(Debug, Clone, PartialEq)]
pub struct Recurrence {
    /// Fixed interval between firings
    pub interval: Duration,

    /// No firing before this instant; the first firing is immediate otherwise
    pub start: Option<DateTime<Utc>>,

    /// No firing after this instant
    pub end: Option<DateTime<Utc>>,

    /// Upper bound of the random delay added to each firing
    pub jitter: Option<Duration>,
}

impl Recurrence {
    pub fn every(interval: Duration) -> Self {
        Self { interval, start: None, end: None, jitter: None }
    }

    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn ending_at(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = Some(jitter);
        self
    }
}

/// A monitored endpoint: what to request, what to expect, how often
#[derive(Debug, Clone)]
pub struct CheckDefinition {
    /// Unique across the loaded configuration
    pub name: String,
    pub request: ProbeRequest,
    pub expectation: Expectation,
    pub recurrence: Recurrence,
}

impl CheckDefinition {
    pub fn new(name: impl Into<String>, request: ProbeRequest, recurrence: Recurrence) -> Self {
        Self { name: name.into(), request, expectation: Expectation::default(), recurrence }
    }

    pub fn with_expectation(mut self, expectation: Expectation) -> Self {
        self.expectation = expectation;
        self
    }
}
