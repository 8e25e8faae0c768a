use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Health verdict of one probe, the unit that is queued and stored.
///
/// `id` is generated fresh per probe and is the deduplication key in
/// storage: a record may be delivered more than once but is stored once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub id: Uuid,

    /// Name of the check definition that produced this result
    pub check_name: String,

    /// Time the request was issued
    pub dt: DateTime<Utc>,

    pub health: bool,

    /// HTTP status code, absent on timeout or transport failure
    pub status: Option<u16>,

    /// Seconds elapsed between request start and classification
    pub duration: Option<f64>,

    /// Length of the response body in characters
    pub length: Option<u64>,

    /// First match of the content pattern
    pub sample: Option<String>,
}
