//! Signal Controller library.
//!
//! Room coordination and signaling relay for peer-to-peer media sessions.
//! A single process lets participants of named rooms discover each other,
//! relays opaque negotiation payloads between specific connections, and
//! enforces per-room membership and moderation policy. Media itself flows
//! directly between participants and never touches this process.
//!
//! # Architecture
//!
//! ```text
//! RoomCoordinatorActor (singleton)
//! ├── room store (host connection, immutable allow-list, room handle)
//! ├── connection registry (participant identity <-> connection id)
//! ├── switchboard (connection id -> outbound handle)
//! └── supervises N RoomActors
//!     └── RoomActor (one per room)
//!         └── live membership group + presence/moderation/chat fan-out
//! ```
//!
//! All state lives in memory for the lifetime of the process. Every
//! mutation of shared state is serialized through an actor mailbox: the
//! coordinator for the store, registry, and switchboard; one actor per room
//! for that room's membership. Outbound delivery is a non-blocking enqueue
//! onto a per-connection queue drained by the connection's own session
//! task, which makes per-connection ordering structural.
//!
//! # Modules
//!
//! - [`actors`] - coordinator, room actors, connection handles
//! - [`protocol`] - wire events (JSON text frames)
//! - [`registry`] - identity <-> connection store
//! - [`transport`] - axum WebSocket server and per-connection sessions
//! - [`config`] - environment configuration
//! - [`errors`] - error types and client-facing reason strings
//! - [`observability`] - health probes and coordinator metrics

pub mod actors;
pub mod config;
pub mod errors;
pub mod observability;
pub mod protocol;
pub mod registry;
pub mod transport;
