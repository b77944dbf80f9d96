//! appmgrd — the appgrid daemon.
//!
//! Thin wrapper around the reconciliation core: connects to the store
//! cluster, starts the change-watch consumer, and shuts down cleanly on
//! SIGINT/SIGTERM.
//!
//! # Usage
//!
//! ```text
//! appmgrd --rep-addr 127.0.0.1:20515 \
//!         --store-cluster http://10.0.0.1:4001,http://10.0.0.2:4001 \
//!         --lifecycle-bundles '{"lucid64":"lucid64-circus.tgz"}'
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use appgrid_bbs::{Bbs, HttpBbs};
use appgrid_builder::StartMessageBuilder;
use appgrid_watcher::{Consumer, Dispatcher};

#[derive(Parser)]
#[command(name = "appmgrd", about = "Desired-state reconciler for LRPs")]
struct Cli {
    /// host:port of the rep service that receives health-hook callbacks.
    #[arg(long, default_value = "127.0.0.1:20515")]
    rep_addr: String,

    /// Comma-separated list of store node URLs.
    #[arg(long, default_value = "http://127.0.0.1:4001")]
    store_cluster: String,

    /// JSON object mapping stack to lifecycle bundle filename.
    #[arg(long, default_value = "{}")]
    lifecycle_bundles: String,

    /// Maximum number of concurrently dispatching changes.
    #[arg(long, default_value = "64")]
    max_in_flight: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,appmgrd=debug,appgrid=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let bundles: HashMap<String, String> = serde_json::from_str(&cli.lifecycle_bundles)
        .context("invalid --lifecycle-bundles")?;

    let nodes = parse_store_cluster(&cli.store_cluster);
    let bbs: Arc<dyn Bbs> = Arc::new(
        HttpBbs::connect(&nodes)
            .await
            .context("connecting to store")?,
    );
    info!("connected to store");

    let builder = StartMessageBuilder::new(&cli.rep_addr, bundles)
        .context("invalid --rep-addr")?;
    let dispatcher = Dispatcher::new(bbs.clone(), builder);
    let consumer = Consumer::new(bbs, dispatcher).with_max_in_flight(cli.max_in_flight);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer_handle = tokio::spawn(consumer.run(shutdown_rx));

    info!("app manager started");

    shutdown_signal().await;
    info!("shutdown signal received");

    let _ = shutdown_tx.send(true);
    let _ = consumer_handle.await;

    info!("app manager exited");
    Ok(())
}

/// Split the cluster flag into node URLs, dropping empty segments.
fn parse_store_cluster(flag: &str) -> Vec<String> {
    flag.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
