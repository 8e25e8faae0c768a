//! Probe data structures.

mod types;

pub use types::{BasicAuth, ProbeRequest, RawOutcome};
