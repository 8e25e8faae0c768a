//! Probe handlers.
//!
//! This module contains the HTTP executor and the request validator.

pub mod http;
pub mod validation;

pub use http::{perform_http_request, HttpProbe};
pub use validation::{validate_probe_request, ValidationError};
