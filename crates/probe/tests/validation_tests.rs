//! Probe request validation tests

use std::time::Duration;

use probe::{validate_probe_request, ProbeRequest, ValidationError};

#[test]
fn test_validate_probe_request_basic() {
    let request = ProbeRequest::new("https://example.com/health");
    assert!(validate_probe_request(&request).is_ok());
}

#[test]
fn test_validate_probe_request_full() {
    let request = ProbeRequest::new("http://test1.com")
        .with_method("post")
        .with_timeout(Duration::from_secs(3))
        .with_header("X-API-KEY", "123456789AAA")
        .with_basic_auth("user", Some("pass".to_string()))
        .with_body("hello");

    assert!(validate_probe_request(&request).is_ok());
}

#[test]
fn test_validate_probe_request_invalid_url() {
    let request = ProbeRequest::new("not a url");
    assert!(matches!(validate_probe_request(&request), Err(ValidationError::InvalidUrl { .. })));
}

#[test]
fn test_validate_probe_request_unsupported_scheme() {
    let request = ProbeRequest::new("ftp://example.com");
    assert_eq!(
        validate_probe_request(&request),
        Err(ValidationError::UnsupportedScheme("ftp".to_string()))
    );
}

#[test]
fn test_validate_probe_request_unsupported_method() {
    let request = ProbeRequest::new("https://example.com").with_method("FETCH");
    assert_eq!(
        validate_probe_request(&request),
        Err(ValidationError::UnsupportedMethod("FETCH".to_string()))
    );
}

#[test]
fn test_validate_probe_request_timeout_bounds() {
    let too_small = ProbeRequest::new("https://example.com").with_timeout(Duration::from_millis(50));
    assert!(matches!(validate_probe_request(&too_small), Err(ValidationError::TimeoutTooSmall(_))));

    let too_large = ProbeRequest::new("https://example.com").with_timeout(Duration::from_secs(400));
    assert!(matches!(validate_probe_request(&too_large), Err(ValidationError::TimeoutTooLarge(_))));
}

#[test]
fn test_validate_probe_request_too_many_headers() {
    let request = (0..21).fold(ProbeRequest::new("https://example.com"), |request, i| {
        request.with_header(format!("X-Header-{i}"), "value")
    });
    assert_eq!(validate_probe_request(&request), Err(ValidationError::TooManyHeaders(21)));
}

#[test]
fn test_validate_probe_request_body_too_large() {
    let request = ProbeRequest::new("https://example.com")
        .with_method("POST")
        .with_body("x".repeat(1024 * 1024 + 1));
    assert!(matches!(validate_probe_request(&request), Err(ValidationError::BodyTooLarge(_))));
}
