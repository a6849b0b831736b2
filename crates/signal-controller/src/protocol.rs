//! Wire protocol for the signaling channel.
//!
//! Events are JSON text frames, externally tagged:
//!
//! ```json
//! { "event": "join-room", "data": { "participantIdentity": "a@x.com", ... } }
//! ```
//!
//! Negotiation payloads (`payload` fields) are opaque: they are carried as
//! raw JSON values and relayed bit-identically. The controller never
//! inspects or validates their structure; that is the concern of the two
//! endpoints' own negotiation protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One peer as seen in an `all-peers` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    /// Transport-assigned connection identity.
    pub connection_id: String,
    /// Registered participant identity.
    pub participant_identity: String,
}

/// Events accepted from a client connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Request admission to a room, optionally creating it (host claim
    /// with an allow-list, for a room identifier not yet known).
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        participant_identity: String,
        room_id: String,
        #[serde(default)]
        is_host_claim: bool,
        /// Closed allow-list for room creation. The caller is responsible
        /// for including its own identity; the controller does not add it.
        #[serde(default)]
        authorized_list: Option<Vec<String>>,
    },

    /// Relay an opaque negotiation offer to a specific connection.
    #[serde(rename_all = "camelCase")]
    SendOffer {
        target_connection_id: String,
        origin_connection_id: String,
        payload: Value,
    },

    /// Relay an opaque negotiation answer back to the offer's origin.
    #[serde(rename_all = "camelCase")]
    SendAnswer {
        payload: Value,
        origin_connection_id: String,
    },

    /// Room-wide chat broadcast (pass-through, not persisted).
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        room_id: String,
        message: String,
        sender_identity: String,
    },

    /// Host-only: advise the room that an attendee is muted.
    #[serde(rename_all = "camelCase")]
    HostMute { target_connection_id: String },

    /// Host-only: advise the room that an attendee is blocked.
    #[serde(rename_all = "camelCase")]
    HostBlock { target_connection_id: String },

    /// Host-only: remove an attendee from the room.
    #[serde(rename_all = "camelCase")]
    HostRemove { target_connection_id: String },
}

/// Events delivered to a client connection.
///
/// Delivery is fire-and-forget and strictly ordered per connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Greeting carrying the transport-assigned connection identity, sent
    /// once immediately after the connection is established.
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: String },

    /// A join was rejected, or a frame could not be understood.
    #[serde(rename_all = "camelCase")]
    RoomError { reason: String },

    /// Private snapshot of all other members, sent to a newly admitted
    /// connection before its own `peer-joined` broadcast.
    #[serde(rename_all = "camelCase")]
    AllPeers { peers: Vec<PeerInfo> },

    /// A connection was admitted to the room. Receivers compare
    /// `connection_id` with their own to recognize themselves.
    #[serde(rename_all = "camelCase")]
    PeerJoined {
        connection_id: String,
        participant_identity: String,
        is_host: bool,
    },

    /// A member's connection was lost.
    #[serde(rename_all = "camelCase")]
    PeerLeft { connection_id: String },

    /// Relayed negotiation offer, enriched with the origin's identity as
    /// registered at relay time.
    #[serde(rename_all = "camelCase")]
    ReceivingOffer {
        payload: Value,
        origin_connection_id: String,
        origin_participant_identity: Option<String>,
    },

    /// Relayed negotiation answer.
    #[serde(rename_all = "camelCase")]
    ReceivingAnswer {
        payload: Value,
        responding_connection_id: String,
    },

    /// Host muted an attendee (advisory; enforcement is the client's job).
    #[serde(rename_all = "camelCase")]
    AttendeeMuted { connection_id: String },

    /// Host blocked an attendee (advisory).
    #[serde(rename_all = "camelCase")]
    AttendeeBlocked { connection_id: String },

    /// Host removed an attendee from the room.
    #[serde(rename_all = "camelCase")]
    AttendeeRemoved { connection_id: String },

    /// Room-wide chat message, timestamped at broadcast time.
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        sender: String,
        message: String,
        timestamp: String,
    },
}
