//! Tracing setup shared by the healthwatch processes.

mod subscriber;

pub use subscriber::{LogFormat, init_tracing, init_with_level};
