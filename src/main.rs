//! dockmasq daemon entry point.
//!
//! Keeps a dnsmasq config file in sync with the running Docker containers
//! and restarts dnsmasq whenever it is rewritten.

use std::sync::Arc;

use clap::Parser;
use log::info;

mod apply;
mod config;
mod error;
mod events;
mod reconcile;
mod render;
mod routes;
mod runtime;
mod shutdown;
mod staleness;
mod types;

use apply::DnsmasqApplier;
use config::{Cli, Config};
use events::EventSubscriber;
use reconcile::Reconciler;
use runtime::DockerRuntime;
use shutdown::Shutdown;
use staleness::StalenessTracker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Load configuration
    let cli = Cli::parse();
    let cfg = Config::load(&cli)?;
    info!("Starting dockmasq with config: {:?}", cfg);

    let runtime = Arc::new(DockerRuntime::connect(
        &cfg.docker_socket,
        cfg.tls_cert_path.as_deref(),
        cfg.docker_timeout_secs,
    )?);
    let tracker = Arc::new(StalenessTracker::new());
    let applier = DnsmasqApplier::new(
        cfg.dnsmasq_config.clone(),
        cfg.restart_command.clone(),
        routes::for_platform(cfg.gateway),
    );
    info!("Managing {}", applier.path().display());
    let reconciler = Reconciler::new(
        Arc::clone(&runtime),
        applier,
        Arc::clone(&tracker),
        cfg.interval(),
    );

    // Initial pass, before anything is subscribed
    reconciler.reconcile_now().await?;

    let subscriber = EventSubscriber::spawn(Arc::clone(&runtime), Arc::clone(&tracker));
    let (handler, stop_rx) = Shutdown::new();
    let mut loop_handle = tokio::spawn(reconciler.run(stop_rx));

    tokio::select! {
        sig = shutdown::wait_for_signal() => {
            let sig = sig?;
            info!("Received {}, shutting down...", sig);
            handler.trigger(&subscriber);
        }
        res = &mut loop_handle => {
            subscriber.unsubscribe();
            res??;
        }
    }

    info!("Shutdown complete.");
    Ok(())
}
