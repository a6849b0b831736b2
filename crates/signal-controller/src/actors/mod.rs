//! Actor model implementation.
//!
//! ```text
//! RoomCoordinatorActor (singleton)
//! ├── owns room store, connection registry, switchboard
//! └── supervises N RoomActors
//!     └── RoomActor (one per room, owns the live membership group)
//! ```
//!
//! Transport sessions are plain tasks that own their socket and drain a
//! per-connection outbound queue; [`connection::ConnectionHandle`] is the
//! enqueue end the actors hold.

pub mod connection;
pub mod coordinator;
pub mod room;

pub use connection::ConnectionHandle;
pub use coordinator::{CoordinatorStatus, RoomCoordinatorHandle};
pub use room::{ModerationAction, RoomActorHandle, RoomState};
