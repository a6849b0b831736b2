//! `RoomActor` - per-room actor that owns the live membership group.
//!
//! Each `RoomActor`:
//! - Owns the room's membership (connection id -> identity + outbound handle)
//! - Performs the admission fan-out (peer snapshot, then `peer-joined`)
//! - Broadcasts departures, moderation effects, and chat
//!
//! All membership mutation for one room is serialized through this actor's
//! mailbox; unrelated rooms proceed concurrently. Access control and host
//! validation happen in the coordinator before a message is sent here - the
//! room actor applies effects, it does not gate them.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::actors::connection::ConnectionHandle;
use crate::errors::ScError;
use crate::protocol::{PeerInfo, ServerEvent};

/// Room mailbox buffer. Sends are `try_send` fire-and-forget; overflow is
/// dropped with a warning rather than blocking the coordinator.
const ROOM_CHANNEL_BUFFER: usize = 256;

/// Host-only moderation effects applied to a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    /// Advisory: the target should mute itself.
    Mute,
    /// Advisory: the target is blocked.
    Block,
    /// Enforced server-side: the target leaves the membership group.
    Remove,
}

/// Messages handled by a `RoomActor`.
#[derive(Debug)]
pub enum RoomMessage {
    /// Admit an already-authorized connection (presence fan-out).
    Admit {
        connection_id: String,
        participant_identity: String,
        handle: ConnectionHandle,
    },
    /// Remove a member and notify the remainder (connection loss).
    Leave { connection_id: String },
    /// Apply a host-validated moderation effect.
    Moderate {
        action: ModerationAction,
        target_connection_id: String,
    },
    /// Broadcast a chat message to all members.
    Chat {
        sender_identity: String,
        message: String,
    },
    /// Snapshot the membership (status and tests).
    GetState {
        respond_to: oneshot::Sender<RoomState>,
    },
}

/// Point-in-time view of a room.
#[derive(Debug, Clone)]
pub struct RoomState {
    /// Room identifier.
    pub room_id: String,
    /// Current members with their registered identities.
    pub members: Vec<PeerInfo>,
}

impl RoomState {
    /// Whether a connection is currently a member.
    #[must_use]
    pub fn contains(&self, connection_id: &str) -> bool {
        self.members
            .iter()
            .any(|peer| peer.connection_id == connection_id)
    }
}

/// Handle to a `RoomActor`.
#[derive(Clone, Debug)]
pub struct RoomActorHandle {
    sender: mpsc::Sender<RoomMessage>,
    cancel_token: CancellationToken,
    room_id: String,
}

impl RoomActorHandle {
    /// Get the room ID.
    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Admit a connection (fire-and-forget).
    pub fn admit(&self, connection_id: String, participant_identity: String, handle: ConnectionHandle) {
        self.deliver(RoomMessage::Admit {
            connection_id,
            participant_identity,
            handle,
        });
    }

    /// Remove a member on connection loss (fire-and-forget).
    pub fn leave(&self, connection_id: String) {
        self.deliver(RoomMessage::Leave { connection_id });
    }

    /// Apply a moderation effect (fire-and-forget; host already validated).
    pub fn moderate(&self, action: ModerationAction, target_connection_id: String) {
        self.deliver(RoomMessage::Moderate {
            action,
            target_connection_id,
        });
    }

    /// Broadcast a chat message (fire-and-forget).
    pub fn chat(&self, sender_identity: String, message: String) {
        self.deliver(RoomMessage::Chat {
            sender_identity,
            message,
        });
    }

    /// Get the current room state.
    ///
    /// # Errors
    ///
    /// [`ScError::Internal`] if the actor is gone.
    pub async fn state(&self) -> Result<RoomState, ScError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomMessage::GetState { respond_to: tx })
            .await
            .map_err(|e| ScError::Internal(format!("room channel send failed: {e}")))?;

        rx.await
            .map_err(|e| ScError::Internal(format!("room response receive failed: {e}")))
    }

    /// Cancel the room actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    fn deliver(&self, message: RoomMessage) {
        if let Err(e) = self.sender.try_send(message) {
            warn!(
                target: "sc.actor.room",
                room_id = %self.room_id,
                error = %e,
                "Room mailbox rejected message"
            );
        }
    }
}

/// The `RoomActor` implementation.
pub struct RoomActor {
    /// Room identifier.
    room_id: String,
    /// Connection that created the room; never changes.
    host_connection_id: String,
    /// Message receiver.
    receiver: mpsc::Receiver<RoomMessage>,
    /// Cancellation token (child of the coordinator's token).
    cancel_token: CancellationToken,
    /// Live membership group.
    members: HashMap<String, Member>,
}

struct Member {
    participant_identity: String,
    handle: ConnectionHandle,
}

impl RoomActor {
    /// Spawn a new room actor. Returns a handle and the task join handle.
    pub fn spawn(
        room_id: String,
        host_connection_id: String,
        cancel_token: CancellationToken,
    ) -> (RoomActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(ROOM_CHANNEL_BUFFER);

        let actor = Self {
            room_id: room_id.clone(),
            host_connection_id,
            receiver,
            cancel_token: cancel_token.clone(),
            members: HashMap::new(),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = RoomActorHandle {
            sender,
            cancel_token,
            room_id,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "sc.actor.room", fields(room_id = %self.room_id))]
    async fn run(mut self) {
        info!(
            target: "sc.actor.room",
            room_id = %self.room_id,
            host_connection_id = %self.host_connection_id,
            "RoomActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(
                        target: "sc.actor.room",
                        room_id = %self.room_id,
                        "RoomActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message),
                        None => {
                            debug!(
                                target: "sc.actor.room",
                                room_id = %self.room_id,
                                "RoomActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "sc.actor.room",
            room_id = %self.room_id,
            members_remaining = self.members.len(),
            "RoomActor stopped"
        );
    }

    fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Admit {
                connection_id,
                participant_identity,
                handle,
            } => self.handle_admit(connection_id, participant_identity, handle),

            RoomMessage::Leave { connection_id } => self.handle_leave(&connection_id),

            RoomMessage::Moderate {
                action,
                target_connection_id,
            } => self.handle_moderate(action, &target_connection_id),

            RoomMessage::Chat {
                sender_identity,
                message,
            } => self.handle_chat(sender_identity, message),

            RoomMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.state());
            }
        }
    }

    /// Presence fan-out for an admitted connection.
    ///
    /// Order matters: the private peer snapshot is enqueued on the
    /// newcomer's channel before the `peer-joined` broadcast, so the
    /// newcomer can never see its own join ahead of its snapshot and never
    /// constructs a duplicate self-peer.
    fn handle_admit(
        &mut self,
        connection_id: String,
        participant_identity: String,
        handle: ConnectionHandle,
    ) {
        let peers: Vec<PeerInfo> = self
            .members
            .iter()
            .filter(|(id, _)| id.as_str() != connection_id)
            .map(|(id, member)| PeerInfo {
                connection_id: id.clone(),
                participant_identity: member.participant_identity.clone(),
            })
            .collect();

        handle.enqueue(ServerEvent::AllPeers { peers });

        self.members.insert(
            connection_id.clone(),
            Member {
                participant_identity: participant_identity.clone(),
                handle,
            },
        );

        // Recomputed at broadcast time, never cached.
        let is_host = connection_id == self.host_connection_id;

        self.broadcast(ServerEvent::PeerJoined {
            connection_id,
            participant_identity,
            is_host,
        });

        info!(
            target: "sc.actor.room",
            room_id = %self.room_id,
            total_members = self.members.len(),
            "Member admitted"
        );
    }

    fn handle_leave(&mut self, connection_id: &str) {
        if self.members.remove(connection_id).is_none() {
            debug!(
                target: "sc.actor.room",
                room_id = %self.room_id,
                connection_id = %connection_id,
                "Leave for non-member ignored"
            );
            return;
        }

        self.broadcast(ServerEvent::PeerLeft {
            connection_id: connection_id.to_string(),
        });

        info!(
            target: "sc.actor.room",
            room_id = %self.room_id,
            connection_id = %connection_id,
            remaining_members = self.members.len(),
            "Member left"
        );
    }

    /// Apply a moderation effect. Mute/block are advisory broadcasts; the
    /// server does not enforce them. Remove also forces the target out of
    /// the membership group, whether or not its client cooperates.
    fn handle_moderate(&mut self, action: ModerationAction, target_connection_id: &str) {
        let event = match action {
            ModerationAction::Mute => ServerEvent::AttendeeMuted {
                connection_id: target_connection_id.to_string(),
            },
            ModerationAction::Block => ServerEvent::AttendeeBlocked {
                connection_id: target_connection_id.to_string(),
            },
            ModerationAction::Remove => ServerEvent::AttendeeRemoved {
                connection_id: target_connection_id.to_string(),
            },
        };

        // The target hears the verdict too, so broadcast before removal.
        self.broadcast(event);

        if action == ModerationAction::Remove && self.members.remove(target_connection_id).is_some()
        {
            info!(
                target: "sc.actor.room",
                room_id = %self.room_id,
                connection_id = %target_connection_id,
                "Member removed by host"
            );
        }
    }

    fn handle_chat(&mut self, sender_identity: String, message: String) {
        self.broadcast(ServerEvent::ChatMessage {
            sender: sender_identity,
            message,
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
    }

    fn state(&self) -> RoomState {
        RoomState {
            room_id: self.room_id.clone(),
            members: self
                .members
                .iter()
                .map(|(id, member)| PeerInfo {
                    connection_id: id.clone(),
                    participant_identity: member.participant_identity.clone(),
                })
                .collect(),
        }
    }

    fn broadcast(&self, event: ServerEvent) {
        for member in self.members.values() {
            member.handle.enqueue(event.clone());
        }
    }
}
