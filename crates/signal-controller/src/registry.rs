//! Connection Registry - bidirectional participant identity / connection
//! identity mapping.
//!
//! The registry is owned by the coordinator actor; all mutation is
//! serialized through that actor's mailbox, so the store itself needs no
//! interior locking.
//!
//! # Single-active-session policy
//!
//! At most one connection per participant identity at any instant. A
//! registration for an identity that is already bound to a *different* live
//! connection is rejected with [`ScError::IdentityInUse`] rather than
//! silently superseding the earlier binding (which would orphan the earlier
//! connection's room membership). The identity frees up when the earlier
//! connection tears down.

use std::collections::HashMap;

use crate::errors::ScError;

/// Bidirectional identity <-> connection map.
///
/// Invariant: `by_identity` and `by_connection` are exact inverses of each
/// other after every public call.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    by_identity: HashMap<String, String>,
    by_connection: HashMap<String, String>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `participant_identity` to `connection_id`.
    ///
    /// Re-registering the same pair is a no-op. A connection that registers
    /// under a new identity drops its previous binding first.
    ///
    /// # Errors
    ///
    /// [`ScError::IdentityInUse`] if the identity is bound to a different
    /// connection.
    pub fn register(
        &mut self,
        participant_identity: &str,
        connection_id: &str,
    ) -> Result<(), ScError> {
        match self.by_identity.get(participant_identity) {
            Some(existing) if existing == connection_id => return Ok(()),
            Some(_) => return Err(ScError::IdentityInUse),
            None => {}
        }

        // A connection holds at most one identity.
        if let Some(previous_identity) = self
            .by_connection
            .insert(connection_id.to_string(), participant_identity.to_string())
        {
            self.by_identity.remove(&previous_identity);
        }
        self.by_identity
            .insert(participant_identity.to_string(), connection_id.to_string());

        Ok(())
    }

    /// The identity registered for a connection, if any.
    #[must_use]
    pub fn identity_of(&self, connection_id: &str) -> Option<&str> {
        self.by_connection.get(connection_id).map(String::as_str)
    }

    /// The connection registered for an identity, if any.
    #[must_use]
    pub fn connection_of(&self, participant_identity: &str) -> Option<&str> {
        self.by_identity
            .get(participant_identity)
            .map(String::as_str)
    }

    /// Remove a connection's entry in both directions, returning the
    /// identity it held. Removing an unknown connection is a no-op.
    pub fn remove_connection(&mut self, connection_id: &str) -> Option<String> {
        let identity = self.by_connection.remove(connection_id)?;
        self.by_identity.remove(&identity);
        Some(identity)
    }

    /// Number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_connection.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_connection.is_empty()
    }
}
