//! LedgerSync worker
//!
//! Loads configuration, opens the encrypted database and runs the job
//! worker and the stale-job reaper until Ctrl-C.

mod context;

use anyhow::Context as _;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::context::WorkerContext;

const DEFAULT_LOG_FILTER: &str = "info,ledgersync=debug";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LEDGERSYNC_LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first so RUST_LOG and LEDGERSYNC_LOG_FORMAT apply
    let dotenv = dotenvy::dotenv();
    init_tracing();
    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(err) => info!(error = %err, "no .env file loaded"),
    }

    let config = ledgersync_infra::config::load().context("failed to load configuration")?;
    let ctx = WorkerContext::new(config).context("failed to initialize worker context")?;

    let mut worker = ctx.job_worker();
    let mut reaper = ctx.job_reaper();

    worker.start().context("failed to start job worker")?;
    reaper.start().await.context("failed to start job reaper")?;
    info!(db = %ctx.db.path().display(), "ledgersync worker running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    info!("shutdown requested");

    if let Err(err) = worker.stop().await {
        warn!(error = %err, "job worker did not stop cleanly");
    }
    if let Err(err) = reaper.stop().await {
        warn!(error = %err, "job reaper did not stop cleanly");
    }

    info!("ledgersync worker stopped");
    Ok(())
}
