use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use healthwatch::broker::{LogBroker, ResultPublisher};
use healthwatch::monitoring::{HealthChecker, MonitoringScheduler, load_sites_file};
use healthwatch::shutdown::shutdown_signal;
use healthwatch::Config;
use probe::HttpProbe;
use tracing::{debug, info, level_filters::LevelFilter};

/// Probe the configured sites and publish every result to the broker
#[derive(Debug, Parser)]
#[command(name = "healthwatch-checker", version, about)]
struct Args {
    /// Config file, created with defaults when missing
    #[arg(short, long, env = "HEALTHWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Sites file, overrides checker.sites_file
    #[arg(short, long)]
    sites: Option<PathBuf>,

    /// Stop after this many seconds instead of running until interrupted
    #[arg(short, long)]
    duration: Option<f64>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logger::init_with_level(if args.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO });

    let config = Config::from_config(args.config.as_ref())?;
    debug!("{config}");

    let sites_file = args.sites.unwrap_or_else(|| config.checker.sites_file.clone());
    let checks = load_sites_file(&sites_file, config.checker.default_timeout())
        .with_context(|| format!("failed to load checks from {}", sites_file.display()))?;
    info!(count = checks.len(), file = %sites_file.display(), "loaded checks");

    let run_for = args
        .duration
        .map(Duration::try_from_secs_f64)
        .transpose()
        .context("--duration must be a non-negative number of seconds")?;

    let broker = LogBroker::connect(&config.broker.url, config.broker.auth_token.as_deref()).await?;
    broker.create_topic_if_not_exists(&config.broker.topic).await?;

    let publisher = ResultPublisher::spawn(Arc::new(broker.producer()), config.broker.topic.clone());
    let checker = HealthChecker::new(HttpProbe::new()?, publisher.clone());

    let mut scheduler = MonitoringScheduler::new(Arc::new(checker));
    scheduler.schedule_checks(checks)?;

    let stats = scheduler.start().run_until(shutdown_signal(), run_for).await;
    for job in &stats {
        info!(check = %job.name, runs = job.runs, coalesced = job.coalesced, "check stopped");
    }

    let published = publisher.close().await?;
    info!(sent = published.sent, failed = published.failed, "checker stopped");
    Ok(())
}
