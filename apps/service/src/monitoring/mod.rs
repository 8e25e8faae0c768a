//! Monitoring engine module - loads check definitions and runs them on
//! their schedules

pub mod checker;
pub mod scheduler;
pub mod sites;
pub mod types;

pub use checker::HealthChecker;
pub use scheduler::{CheckRunner, JobStats, MonitoringScheduler, RunningScheduler};
pub use sites::{SitesFormat, load_sites_file, parse_sites};
pub use types::{CheckDefinition, Recurrence};
