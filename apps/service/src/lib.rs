//! healthwatch - periodic HTTP health checks relayed into storage
//!
//! The checker process schedules probes and publishes every result to a
//! broker topic; the writer process relays that topic into the
//! `health_checks` table.

pub mod broker;
pub mod config;
pub mod database;
pub mod error;
pub mod monitoring;
pub mod pool;
pub mod relay;
pub mod shutdown;
pub mod timestamp;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{ConfigError, PublishError, RelayError, SchedulerError};
