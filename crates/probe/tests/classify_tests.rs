//! Health classification tests

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use probe::{classify, Expectation, RawOutcome};
use uuid::Uuid;

const LOOKAROUND: &str = r"(?<=pp)\d+(?=ss)";

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
}

fn response(status: u16, body: &str) -> RawOutcome {
    RawOutcome::response(status, body.to_string(), start(), Duration::from_millis(10))
}

fn failure() -> RawOutcome {
    RawOutcome::failed(start(), Duration::from_secs(3))
}

#[test]
fn test_expected_status_without_pattern_is_healthy() {
    let id = Uuid::new_v4();
    let result = classify("svc", id, start(), &Expectation::status(200), &response(200, "ok"));

    assert!(result.health);
    assert_eq!(result.id, id);
    assert_eq!(result.check_name, "svc");
    assert_eq!(result.dt, start());
    assert_eq!(result.status, Some(200));
    assert_eq!(result.length, Some(2));
    assert_eq!(result.sample, None);
}

#[test]
fn test_pattern_match_yields_sample() {
    let expectation = Expectation::pattern(LOOKAROUND).unwrap();
    let result = classify("svc", Uuid::new_v4(), start(), &expectation, &response(201, "pp23ss"));

    assert!(result.health);
    assert_eq!(result.status, Some(201));
    assert_eq!(result.length, Some(6));
    assert_eq!(result.sample.as_deref(), Some("23"));
}

#[test]
fn test_unexpected_status_is_unhealthy() {
    let result = classify(
        "svc",
        Uuid::new_v4(),
        start(),
        &Expectation::status(200),
        &response(500, "internal server error"),
    );

    assert!(!result.health);
    assert_eq!(result.status, Some(500));
    assert_eq!(result.length, Some(21));
    assert_eq!(result.sample, None);
}

#[test]
fn test_pattern_not_found_is_unhealthy() {
    let expectation = Expectation::pattern(LOOKAROUND).unwrap();
    let result = classify("svc", Uuid::new_v4(), start(), &expectation, &response(200, "pp--ss"));

    assert!(!result.health);
    assert_eq!(result.sample, None);
    assert_eq!(result.length, Some(6));
}

#[test]
fn test_pattern_gated_by_status_match() {
    let expectation = Expectation::new(Some(200), Expectation::pattern(LOOKAROUND).unwrap().pattern);
    let result = classify("svc", Uuid::new_v4(), start(), &expectation, &response(503, "pp23ss"));

    assert!(!result.health);
    assert_eq!(result.sample, None);
}

#[test]
fn test_any_status_accepted_without_expectation() {
    for status in [200, 302, 404, 500] {
        let result = classify("svc", Uuid::new_v4(), start(), &Expectation::default(), &response(status, "x"));
        assert!(result.health, "status {status} should be accepted");
    }
}

#[test]
fn test_transport_failure_is_always_unhealthy() {
    let expectations = [
        Expectation::default(),
        Expectation::status(200),
        Expectation::pattern(LOOKAROUND).unwrap(),
    ];

    for expectation in &expectations {
        let result = classify("svc", Uuid::new_v4(), start(), expectation, &failure());
        assert!(!result.health);
        assert_eq!(result.status, None);
        assert_eq!(result.length, None);
        assert_eq!(result.sample, None);
    }
}

#[test]
fn test_empty_body_with_pattern_is_unhealthy() {
    let expectation = Expectation::pattern(".*").unwrap();
    let result = classify("svc", Uuid::new_v4(), start(), &expectation, &response(200, ""));

    assert!(!result.health);
    assert_eq!(result.length, Some(0));
    assert_eq!(result.sample, None);
}

#[test]
fn test_length_counts_characters() {
    let result = classify("svc", Uuid::new_v4(), start(), &Expectation::default(), &response(200, "héllo"));
    assert_eq!(result.length, Some(5));
}

#[test]
fn test_duration_measured_from_request_start() {
    let req_start = Utc::now() - chrono::Duration::milliseconds(1500);
    let raw = RawOutcome::response(200, "ok".to_string(), req_start, Duration::from_millis(1500));
    let result = classify("svc", Uuid::new_v4(), req_start, &Expectation::default(), &raw);

    let duration = result.duration.unwrap();
    assert!(duration >= 1.5, "duration was {duration}");
    assert!(duration < 60.0);
}

#[test]
fn test_result_serializes_to_flat_record() {
    let expectation = Expectation::pattern(LOOKAROUND).unwrap();
    let result = classify("svc", Uuid::new_v4(), start(), &expectation, &response(201, "pp23ss"));

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["check_name"], "svc");
    assert_eq!(value["dt"], "2023-01-01T00:00:00Z");
    assert_eq!(value["health"], true);
    assert_eq!(value["status"], 201);
    assert_eq!(value["length"], 6);
    assert_eq!(value["sample"], "23");
    assert!(value["id"].as_str().is_some());
}
