//! Reconcile the Citus worker list with the worker service of our swarm stack.
use envconfig::Envconfig;
use eyre::Result;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use membership_manager::config::Config;
use membership_manager::control_loop::initialize;
use membership_manager::docker::DockerEngine;
use membership_manager::handlers;
use membership_manager::readiness::PgReadinessProber;

// Docker sends SIGTERM on `docker stop` and waits before killing us, exit right away instead.
async fn shutdown() {
    let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");

    let mut interrupt = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to register SIGINT handler");

    tokio::select! {
        _ = term.recv() => info!("received SIGTERM"),
        _ = interrupt.recv() => info!("received SIGINT"),
    };
}

#[tokio::main]
async fn main() -> Result<()> {
    // Status lines go to stderr, RUST_LOG controls verbosity.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let config = Config::init_from_env()?;

    let bind = config.bind();
    let router = common_metrics::setup_metrics_routes(handlers::app())?;
    tokio::spawn(async move {
        if let Err(e) = common_metrics::serve(router, &bind).await {
            error!("failed to serve metrics on {}: {}", bind, e);
        }
    });

    let orchestrator = DockerEngine::new(&config.docker_socket);
    let prober = PgReadinessProber::new(config.credentials());

    let shutdown = shutdown();
    tokio::pin!(shutdown);

    // Waiting for the coordinator can take forever, a signal has to be able to stop it.
    let mut control_loop = tokio::select! {
        _ = &mut shutdown => {
            info!("shutting down...");
            return Ok(());
        }
        control_loop = initialize(&config, orchestrator, prober) => control_loop?,
    };

    control_loop.run(shutdown).await?;

    info!("exiting");

    Ok(())
}
