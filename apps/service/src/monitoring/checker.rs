use async_trait::async_trait;
use probe::{CheckResult, HttpProbe, classify};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::scheduler::CheckRunner;
use super::types::CheckDefinition;
use crate::broker::ResultPublisher;

/// Probes a check, classifies the outcome and hands the result to the publisher
pub struct HealthChecker {
    probe: HttpProbe,
    publisher: ResultPublisher,
}

impl HealthChecker {
    pub fn new(probe: HttpProbe, publisher: ResultPublisher) -> Self {
        Self { probe, publisher }
    }

    /// One probe of `check`, without publishing
    pub async fn do_check(&self, check: &CheckDefinition) -> CheckResult {
        let req_id = Uuid::new_v4();
        let outcome = self.probe.execute(&check.name, &req_id.to_string(), &check.request).await;
        classify(&check.name, req_id, outcome.started_at, &check.expectation, &outcome)
    }
}

#[async_trait]
impl CheckRunner for HealthChecker {
    async fn run_check(&self, check: &CheckDefinition) {
        let result = self.do_check(check).await;

        if result.health {
            debug!(check = %result.check_name, id = %result.id, status = ?result.status, "healthy");
        } else {
            info!(check = %result.check_name, id = %result.id, status = ?result.status, "unhealthy");
        }

        if let Err(error) = self.publisher.publish(result) {
            warn!(check = %check.name, %error, "check result dropped");
        }
    }
}
