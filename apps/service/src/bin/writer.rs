use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use healthwatch::broker::LogBroker;
use healthwatch::database::{DatabaseImpl, initialize_database};
use healthwatch::pool::connect_pool;
use healthwatch::relay::ResultRelay;
use healthwatch::shutdown::shutdown_signal;
use healthwatch::Config;
use tracing::{debug, info, level_filters::LevelFilter};

/// Relay check results from the broker into the health_checks table
#[derive(Debug, Parser)]
#[command(name = "healthwatch-writer", version, about)]
struct Args {
    /// Config file, created with defaults when missing
    #[arg(short, long, env = "HEALTHWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Relay a single batch and exit
    #[arg(long)]
    once: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logger::init_with_level(if args.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO });

    let config = Config::from_config(args.config.as_ref())?;
    debug!("{config}");

    let pool = connect_pool(
        &config.database.url,
        config.database.auth_token.as_deref(),
        config.database.pool_size,
    )
    .await?;
    initialize_database(&*pool.get().await.map_err(|error| anyhow::anyhow!("{error}"))?).await?;
    info!(url = %config.database.url, "connected to database");

    let broker = LogBroker::connect(&config.broker.url, config.broker.auth_token.as_deref()).await?;
    broker.create_topic_if_not_exists(&config.broker.topic).await?;

    let consumer = broker.consumer(
        &config.broker.group_id,
        &config.broker.client_id,
        &config.broker.topic,
        config.writer.max_poll_records,
    );
    let store = Arc::new(DatabaseImpl::new_from_pool(pool));
    let mut relay = ResultRelay::new(consumer, store, config.writer.poll_timeout());

    if args.once {
        let report = relay.write_once().await?;
        info!(received = report.received, written = report.written, dropped = report.dropped, "batch relayed");
    } else {
        relay.write_forever(shutdown_signal()).await;
    }

    Ok(())
}
