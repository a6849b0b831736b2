//! `ConnectionHandle` - outbound side of one live client connection.
//!
//! The transport session task owns the socket and drains the outbound
//! queue; the handle is the cloneable enqueue end shared with the
//! coordinator and room actors. Enqueue is non-blocking fire-and-forget:
//! the core never waits for delivery, and an event enqueued to a connection
//! that is already gone is dropped.
//!
//! Per-connection ordering: one queue, one writer task, so events arrive in
//! enqueue order.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::protocol::ServerEvent;

/// Cloneable handle for delivering events to one connection.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    connection_id: String,
    sender: mpsc::UnboundedSender<ServerEvent>,
    cancel_token: CancellationToken,
}

impl ConnectionHandle {
    /// Create a handle around an outbound queue and its session token.
    #[must_use]
    pub fn new(
        connection_id: String,
        sender: mpsc::UnboundedSender<ServerEvent>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            connection_id,
            sender,
            cancel_token,
        }
    }

    /// Get the connection ID.
    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Enqueue an event for delivery. Never blocks; an event for a closed
    /// connection is dropped.
    pub fn enqueue(&self, event: ServerEvent) {
        if self.sender.send(event).is_err() {
            debug!(
                target: "sc.connection",
                connection_id = %self.connection_id,
                "Dropped event for closed connection"
            );
        }
    }

    /// Cancel the connection's session task.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the session is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Wait for the session to be cancelled.
    pub async fn cancelled(&self) {
        self.cancel_token.cancelled().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn test_handle() -> (ConnectionHandle, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::new("conn-1".to_string(), tx, CancellationToken::new());
        (handle, rx)
    }

    #[tokio::test]
    async fn test_enqueue_delivers_in_order() {
        let (handle, mut rx) = test_handle();

        handle.enqueue(ServerEvent::PeerLeft {
            connection_id: "a".to_string(),
        });
        handle.enqueue(ServerEvent::PeerLeft {
            connection_id: "b".to_string(),
        });

        assert!(
            matches!(rx.recv().await, Some(ServerEvent::PeerLeft { connection_id }) if connection_id == "a")
        );
        assert!(
            matches!(rx.recv().await, Some(ServerEvent::PeerLeft { connection_id }) if connection_id == "b")
        );
    }

    #[tokio::test]
    async fn test_enqueue_after_receiver_dropped_is_silent() {
        let (handle, rx) = test_handle();
        drop(rx);

        // Must not panic or block.
        handle.enqueue(ServerEvent::PeerLeft {
            connection_id: "a".to_string(),
        });
    }

    #[tokio::test]
    async fn test_cancellation() {
        let (handle, _rx) = test_handle();
        assert!(!handle.is_cancelled());

        handle.cancel();
        assert!(handle.is_cancelled());
        handle.cancelled().await;
    }
}
