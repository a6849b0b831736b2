//! Per-connection WebSocket session.
//!
//! One task per socket: it owns both halves of the connection, draining the
//! outbound queue into the sink and parsing inbound text frames into
//! [`ClientEvent`]s for the coordinator. The task is the sole writer for
//! its connection, which gives the per-connection delivery ordering the
//! core relies on.
//!
//! Connection loss - read error, close frame, or stream end - is treated
//! identically and reported to the coordinator exactly once, when the
//! session loop exits.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::actors::{ConnectionHandle, RoomCoordinatorHandle};
use crate::errors::ScError;
use crate::protocol::{ClientEvent, ServerEvent};

/// Run one connection's session until the socket closes or the server
/// shuts down.
#[instrument(skip_all, name = "sc.transport.session", fields(connection_id))]
pub async fn run(
    socket: WebSocket,
    coordinator: RoomCoordinatorHandle,
    cancel_token: CancellationToken,
) {
    let connection_id = uuid::Uuid::new_v4().to_string();
    tracing::Span::current().record("connection_id", connection_id.as_str());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let handle = ConnectionHandle::new(connection_id.clone(), event_tx, cancel_token.clone());

    // The greeting goes on the queue first, so it is the first event the
    // client reads; everything else flows through the coordinator.
    handle.enqueue(ServerEvent::Connected {
        connection_id: connection_id.clone(),
    });

    if coordinator
        .connection_opened(connection_id.clone(), handle.clone())
        .await
        .is_err()
    {
        debug!(
            target: "sc.transport",
            connection_id = %connection_id,
            "Coordinator gone before session start"
        );
        return;
    }

    debug!(
        target: "sc.transport",
        connection_id = %connection_id,
        "Session started"
    );

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                debug!(
                    target: "sc.transport",
                    connection_id = %connection_id,
                    "Session cancelled"
                );
                break;
            }

            outbound = event_rx.recv() => {
                match outbound {
                    Some(event) => {
                        if !forward_event(&mut ws_tx, &connection_id, &event).await {
                            break;
                        }
                    }
                    // All enqueue handles dropped; nothing more can arrive.
                    None => break,
                }
            }

            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if handle_frame(&coordinator, &handle, &connection_id, &text)
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(
                            target: "sc.transport",
                            connection_id = %connection_id,
                            "Socket closed by peer"
                        );
                        break;
                    }
                    // Pings and pongs are answered by axum; binary frames
                    // are not part of the protocol.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(
                            target: "sc.transport",
                            connection_id = %connection_id,
                            error = %e,
                            "Socket read failed"
                        );
                        break;
                    }
                }
            }
        }
    }

    // Sole loss report for this connection; the coordinator's teardown is
    // idempotent regardless.
    let _ = coordinator.connection_closed(connection_id.clone()).await;

    debug!(
        target: "sc.transport",
        connection_id = %connection_id,
        "Session ended"
    );
}

/// Serialize and send one outbound event. Returns false when the socket is
/// no longer writable.
async fn forward_event(
    ws_tx: &mut (impl SinkExt<Message> + Unpin),
    connection_id: &str,
    event: &ServerEvent,
) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(
                target: "sc.transport",
                connection_id = %connection_id,
                error = %e,
                "Failed to serialize outbound event"
            );
            return true;
        }
    };

    ws_tx.send(Message::Text(json)).await.is_ok()
}

/// Parse one inbound frame and route it. A malformed frame is answered
/// with `room-error { bad-request }` and the session stays open; only a
/// dead coordinator ends the session.
async fn handle_frame(
    coordinator: &RoomCoordinatorHandle,
    handle: &ConnectionHandle,
    connection_id: &str,
    text: &str,
) -> Result<(), ScError> {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => {
            coordinator
                .client_event(connection_id.to_string(), event)
                .await
        }
        Err(e) => {
            debug!(
                target: "sc.transport",
                connection_id = %connection_id,
                error = %e,
                "Malformed inbound frame"
            );
            handle.enqueue(ServerEvent::RoomError {
                reason: ScError::BadRequest.reason().to_string(),
            });
            Ok(())
        }
    }
}
