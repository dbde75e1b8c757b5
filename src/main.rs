#![warn(unused_crate_dependencies)]

use crate::{
    config::VERSION,
    leaderboard::LeaderboardIndex,
    services::{leaderboard::LeaderboardService, simulation::Simulation, users::UserService},
};
use axum::Extension;
use log::{error, info};
use std::{future::IntoFuture, net::SocketAddr, process::ExitCode, sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal, sync::watch};
use utils::logging;

mod config;
mod database;
mod leaderboard;
mod middleware;
mod routes;
mod services;
mod utils;

/// Time in-flight requests get to finish once shutdown begins, the
/// process exits nonzero when the deadline passes
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    let config = config::load_config().unwrap_or_default();

    // Initialize logging
    logging::setup(config.logging);

    // Create the server socket address while the port is still available
    let addr: SocketAddr = SocketAddr::new(config.host, config.port);

    tokio::spawn(logging::log_connection_urls(config.port));

    let db = match database::connect(&config.database).await {
        Ok(value) => value,
        Err(err) => {
            error!("Failed to connect to database: {err:?}");
            return ExitCode::FAILURE;
        }
    };

    let index = match LeaderboardIndex::connect(&config.redis.url).await {
        Ok(value) => value,
        Err(err) => {
            error!("Failed to connect to leaderboard index: {err:?}");
            return ExitCode::FAILURE;
        }
    };

    let leaderboard = Arc::new(LeaderboardService::new(db.clone(), index.clone()));
    let users = Arc::new(UserService::new(db.clone(), index.clone()));
    let simulation = Arc::new(Simulation::new(db, index));

    // Create the HTTP router
    let router = routes::router()
        // Apply data extensions
        .layer(Extension(leaderboard))
        .layer(Extension(users))
        .layer(Extension(simulation.clone()))
        .into_make_service();

    info!("Starting server on {} (v{})", addr, VERSION);

    // Start the TCP listener
    let listener = match TcpListener::bind(addr).await {
        Ok(value) => value,
        Err(err) => {
            error!("Failed to bind HTTP server on {}: {:?}", addr, err);
            return ExitCode::FAILURE;
        }
    };

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    // Run the HTTP server
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            _ = signal::ctrl_c().await;
            info!("Shutdown signal received");
            // The simulator must be idle before the listener winds down
            simulation.stop();
            _ = shutdown_tx.send(true);
        })
        .into_future();
    let mut server = std::pin::pin!(server);

    // Serve until the shutdown signal arrives
    tokio::select! {
        result = &mut server => {
            return match result {
                Ok(_) => ExitCode::SUCCESS,
                Err(err) => {
                    error!("Error within HTTP server: {err:?}");
                    ExitCode::FAILURE
                }
            }
        }
        _ = shutdown_rx.changed() => {}
    }

    // In-flight requests get the rest of the deadline before a forced exit
    match tokio::time::timeout(SHUTDOWN_DEADLINE, &mut server).await {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(err)) => {
            error!("Error within HTTP server: {err:?}");
            ExitCode::FAILURE
        }
        Err(_) => {
            error!(
                "Forced shutdown, in-flight requests exceeded the {}s deadline",
                SHUTDOWN_DEADLINE.as_secs()
            );
            ExitCode::FAILURE
        }
    }
}
