//! Signal Controller error types.
//!
//! Errors that reach a client travel as `room-error { reason }` events; the
//! reason strings are stable and machine-readable. Internal details are
//! logged server-side and never serialized onto the wire.

use thiserror::Error;

/// Signal Controller error type.
///
/// Only the first four variants are ever surfaced to a client (as a
/// `room-error` reason); everything else is absorbed locally.
#[derive(Debug, Error)]
pub enum ScError {
    /// Join targeted a room identifier the store does not know.
    #[error("room not found")]
    RoomNotFound,

    /// Participant identity is not on the room's allow-list.
    #[error("participant not authorized for room")]
    NotAuthorized,

    /// Participant identity is already bound to another live connection.
    #[error("identity already in use by another connection")]
    IdentityInUse,

    /// Inbound frame could not be parsed as a known event.
    #[error("malformed or unknown event")]
    BadRequest,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error (actor channel failures and the like).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ScError {
    /// Stable reason string carried by `room-error` events.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            ScError::RoomNotFound => "room-not-found",
            ScError::NotAuthorized => "not-authorized",
            ScError::IdentityInUse => "identity-in-use",
            ScError::BadRequest => "bad-request",
            ScError::Config(_) | ScError::Internal(_) => "internal-error",
        }
    }

    /// Client-safe message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> &'static str {
        match self {
            ScError::RoomNotFound => "Room does not exist",
            ScError::NotAuthorized => "You are not allowed to join this room",
            ScError::IdentityInUse => "This identity is already connected",
            ScError::BadRequest => "Malformed request",
            ScError::Config(_) | ScError::Internal(_) => "An internal error occurred",
        }
    }
}
