//! HTTP probe handling.

mod request;

pub use request::{perform_http_request, HttpProbe};
