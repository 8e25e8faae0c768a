use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tracing::{debug, error, info};

use super::types::CheckDefinition;
use crate::error::SchedulerError;

/// Performs one execution of a check
#[async_trait]
pub trait CheckRunner: Send + Sync {
    async fn run_check(&self, check: &CheckDefinition);
}

/// Per-job counters, returned when the scheduler stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStats {
    pub name: String,
    /// Completed executions
    pub runs: u64,
    /// Ticks folded into a single catch-up run because an execution overran
    pub coalesced: u64,
}

/// Monitoring scheduler - runs every check on its own interval.
///
/// Each check gets a task that awaits its execution before waiting for the
/// next tick, so a check never overlaps itself. Ticks missed while an
/// execution overran collapse into one immediate run.
pub struct MonitoringScheduler {
    runner: Arc<dyn CheckRunner>,
    checks: Vec<CheckDefinition>,
}

impl MonitoringScheduler {
    pub fn new(runner: Arc<dyn CheckRunner>) -> Self {
        Self { runner, checks: Vec::new() }
    }

    /// Register a check; names must be unique
    pub fn schedule_check(&mut self, check: CheckDefinition) -> Result<(), SchedulerError> {
        if self.checks.iter().any(|scheduled| scheduled.name == check.name) {
            return Err(SchedulerError::DuplicateCheck(check.name));
        }
        self.checks.push(check);
        Ok(())
    }

    /// Register several checks, rejecting the whole set on a duplicate name
    pub fn schedule_checks(&mut self, checks: Vec<CheckDefinition>) -> Result<(), SchedulerError> {
        let mut names: HashSet<&str> = self.checks.iter().map(|check| check.name.as_str()).collect();
        if let Some(duplicate) = checks.iter().find(|check| !names.insert(check.name.as_str())) {
            return Err(SchedulerError::DuplicateCheck(duplicate.name.clone()));
        }
        self.checks.extend(checks);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Spawn one task per check on the current runtime
    pub fn start(self) -> RunningScheduler {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handles = self
            .checks
            .into_iter()
            .map(|check| {
                let job = Job::new(check);
                info!(check = %job.check.name, interval = ?job.check.recurrence.interval, "scheduled check");
                tokio::spawn(run_job(job, self.runner.clone(), shutdown_rx.clone()))
            })
            .collect();

        RunningScheduler { shutdown_tx, handles }
    }
}

pub struct RunningScheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<JobStats>>,
}

impl RunningScheduler {
    /// Run until `shutdown` resolves or `duration` has elapsed, then stop
    pub async fn run_until<F>(self, shutdown: F, duration: Option<Duration>) -> Vec<JobStats>
    where
        F: Future<Output = ()>,
    {
        let deadline = async {
            match duration {
                Some(duration) => sleep(duration).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = shutdown => info!("shutdown requested"),
            _ = deadline => info!("run duration elapsed"),
        }

        self.stop().await
    }

    /// Stop firing and wait for in-flight executions to finish
    pub async fn stop(self) -> Vec<JobStats> {
        let _ = self.shutdown_tx.send(true);

        join_all(self.handles)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(stats) => Some(stats),
                Err(error) => {
                    error!(%error, "check task failed");
                    None
                }
            })
            .collect()
    }
}

struct Job {
    check: CheckDefinition,
    first_fire: Instant,
    end: Option<Instant>,
    /// End bound already passed when the scheduler started
    retired: bool,
}

/// Map a wall-clock time onto the runtime clock
fn instant_at(at: DateTime<Utc>) -> Instant {
    let now = Instant::now();
    match (at - Utc::now()).to_std() {
        Ok(ahead) => now + ahead,
        Err(_) => now,
    }
}

impl Job {
    fn new(check: CheckDefinition) -> Self {
        let first_fire = check.recurrence.start.map(instant_at).unwrap_or_else(Instant::now);
        let end = check.recurrence.end.map(instant_at);
        let retired = check.recurrence.end.is_some_and(|end| end <= Utc::now());
        Self { check, first_fire, end, retired }
    }

    fn period(&self) -> Duration {
        self.check.recurrence.interval.max(Duration::from_millis(1))
    }

    fn jitter_delay(&self) -> Option<Duration> {
        self.check
            .recurrence
            .jitter
            .filter(|jitter| !jitter.is_zero())
            .map(|jitter| rand::thread_rng().gen_range(Duration::ZERO..=jitter))
    }

    fn expired(&self) -> bool {
        self.retired || self.end.is_some_and(|end| Instant::now() > end)
    }
}

async fn run_job(job: Job, runner: Arc<dyn CheckRunner>, mut shutdown: watch::Receiver<bool>) -> JobStats {
    let period = job.period();
    let mut stats = JobStats { name: job.check.name.clone(), ..Default::default() };

    let mut timer = interval_at(job.first_fire, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = timer.tick() => {}
        }

        if let Some(delay) = job.jitter_delay() {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = sleep(delay) => {}
            }
        }

        if job.expired() {
            info!(check = %job.check.name, "end date reached, check retired");
            break;
        }

        let started = Instant::now();
        runner.run_check(&job.check).await;
        stats.runs += 1;

        let missed = (started.elapsed().as_nanos() / period.as_nanos()) as u64;
        if missed > 0 {
            stats.coalesced += missed;
            debug!(check = %job.check.name, missed, "execution overran its interval, missed ticks coalesced");
        }
    }

    stats
}
