//! Signaling WebSocket server.
//!
//! A single `GET /ws` route upgrades to WebSocket and hands the socket to a
//! per-connection session task. Connection identities are assigned here at
//! upgrade time and are stable for the connection's lifetime.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::actors::RoomCoordinatorHandle;
use crate::transport::session;

/// Shared state for the signaling router.
#[derive(Clone)]
struct TransportState {
    coordinator: RoomCoordinatorHandle,
    shutdown_token: CancellationToken,
}

/// Build the signaling router.
fn signaling_router(coordinator: RoomCoordinatorHandle, shutdown_token: CancellationToken) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(TransportState {
            coordinator,
            shutdown_token,
        })
        .layer(TraceLayer::new_for_http())
}

/// `GET /ws` - upgrade to WebSocket and start a session.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<TransportState>,
) -> impl IntoResponse {
    let coordinator = state.coordinator.clone();
    let session_token = state.shutdown_token.child_token();

    ws.on_upgrade(move |socket| session::run(socket, coordinator, session_token))
}

/// Serve the signaling endpoint on an already-bound listener until the
/// shutdown token fires.
///
/// # Errors
///
/// Returns the underlying I/O error if the server fails.
pub async fn serve(
    listener: TcpListener,
    coordinator: RoomCoordinatorHandle,
    shutdown_token: CancellationToken,
) -> std::io::Result<()> {
    let app = signaling_router(coordinator, shutdown_token.clone());

    info!(
        target: "sc.transport",
        addr = ?listener.local_addr().ok(),
        "Signaling server starting"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_token.cancelled().await;
            info!(target: "sc.transport", "Signaling server shutting down");
        })
        .await
}
