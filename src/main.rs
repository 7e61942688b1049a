#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! EchoBeats — an autonomous cognitive scheduler.
//!
//! # Usage
//!
//! ```sh
//! echobeats                          # run with defaults
//! echobeats --storage-dir ./state    # persist snapshots elsewhere
//! echobeats --config ./config.json   # overlay a config file
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use echobeats::config::Config;
use echobeats::runtime::Runtime;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Directory where snapshots are saved and loaded from.
    #[arg(long, default_value = "./echobeats-state")]
    storage_dir: PathBuf,

    /// Optional JSON config file overlaid on top of the documented defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Identity name carried in the persisted snapshot.
    #[arg(long, default_value = "echobeats")]
    identity_name: String,
}

#[cfg_attr(coverage_nightly, coverage(off))]
fn main() -> anyhow::Result<()> {
    color_eyre::install().ok();
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_new(&args.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let tokio_runtime = tokio::runtime::Runtime::new()?;
    tokio_runtime.block_on(run(args, config))
}

#[cfg_attr(coverage_nightly, coverage(off))]
async fn run(args: Args, config: Config) -> anyhow::Result<()> {
    info!("echobeats starting");
    let runtime = Arc::new(Runtime::new(config, args.storage_dir, args.identity_name, Vec::new()).await?);
    let handles = runtime.spawn();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received interrupt, shutting down");
        }
        () = wait_for_terminate() => {
            info!("received terminate, shutting down");
        }
    }

    runtime.shutdown();
    for handle in handles {
        let _ = handle.await;
    }
    info!("echobeats stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_terminate() {
    let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");
    signal.recv().await;
}

#[cfg(not(unix))]
async fn wait_for_terminate() {
    std::future::pending::<()>().await;
}
