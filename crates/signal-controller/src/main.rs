//! Signal Controller
//!
//! Room coordination and signaling-relay server for peer-to-peer media
//! sessions.
//!
//! # Servers
//!
//! - WebSocket signaling endpoint (default: 0.0.0.0:8000, `GET /ws`)
//! - HTTP server for health probes and metrics (default: 0.0.0.0:8081)
//!
//! # Startup flow
//!
//! 1. Initialize tracing
//! 2. Load configuration from environment
//! 3. Install the Prometheus metrics recorder
//! 4. Spawn the coordinator actor system
//! 5. Start the health HTTP server
//! 6. Start the signaling server, then mark ready
//! 7. Wait for Ctrl+C / SIGTERM, flip to not-ready, cancel the token tree

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use signal_controller::actors::RoomCoordinatorHandle;
use signal_controller::config::Config;
use signal_controller::observability::{health_router, CoordinatorMetrics, HealthState};
use signal_controller::transport;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signal_controller=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Signal Controller");

    let config = Config::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        anyhow::anyhow!(e)
    })?;

    info!(
        controller_id = %config.controller_id,
        bind_address = %config.bind_address,
        health_bind_address = %config.health_bind_address,
        "Configuration loaded"
    );

    // Metrics recorder must be installed before anything records.
    let prometheus_handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        anyhow::anyhow!("failed to install Prometheus metrics recorder: {e}")
    })?;

    let health_state = Arc::new(HealthState::new());
    let metrics = CoordinatorMetrics::new();

    let coordinator =
        RoomCoordinatorHandle::new(config.controller_id.clone(), Arc::clone(&metrics));
    let shutdown_token = coordinator.child_token();
    info!("Actor system initialized");

    // Health server: bind before spawning to fail fast on bind errors.
    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );
    let health_app = health_router(Arc::clone(&health_state)).merge(metrics_router);

    let health_listener = tokio::net::TcpListener::bind(config.health_bind_address)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %config.health_bind_address, "Failed to bind health server");
            anyhow::anyhow!("failed to bind health server to {}: {e}", config.health_bind_address)
        })?;

    let health_shutdown_token = shutdown_token.child_token();
    tokio::spawn(async move {
        let server = axum::serve(health_listener, health_app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });
    info!(addr = %config.health_bind_address, "Health server started");

    // Signaling server.
    let signaling_listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %config.bind_address, "Failed to bind signaling server");
            anyhow::anyhow!("failed to bind signaling server to {}: {e}", config.bind_address)
        })?;

    let signaling_coordinator = coordinator.clone();
    let signaling_shutdown_token = shutdown_token.child_token();
    tokio::spawn(async move {
        if let Err(e) = transport::serve(
            signaling_listener,
            signaling_coordinator,
            signaling_shutdown_token,
        )
        .await
        {
            error!(error = %e, "Signaling server failed");
        }
    });
    info!(addr = %config.bind_address, "Signaling server started");

    health_state.set_ready();
    info!("Signal Controller running - press Ctrl+C to shutdown");

    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");

    // Flip readiness first so load balancers stop routing new connections,
    // then cancel the token tree (sessions, servers, room actors).
    health_state.set_not_ready();
    coordinator.cancel();

    // Give sessions and actors time to drain.
    tokio::time::sleep(Duration::from_secs(2)).await;

    info!("Signal Controller shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed; without them the service
/// cannot shut down gracefully.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
