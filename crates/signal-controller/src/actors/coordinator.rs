//! `RoomCoordinatorActor` - singleton actor that routes every inbound event.
//!
//! The coordinator owns:
//! - the room store (room id -> host connection, allow-list, actor handle)
//! - the connection registry (participant identity <-> connection id)
//! - the switchboard of live connection handles
//! - the connection -> rooms membership index
//!
//! and supervises one `RoomActor` per room. Every message a room actor
//! receives is fire-and-forget, so a busy room never stalls the others;
//! the coordinator itself only performs map lookups and channel enqueues.
//!
//! Routing (one inbound event -> exactly one path):
//! - `join-room`      -> access control here, presence fan-out in the room
//! - `send-offer` / `send-answer` -> relay straight off the switchboard
//! - `host-*`         -> host gate here, effect applied in the room
//! - `chat-message`   -> room broadcast
//! - connection loss  -> teardown across all of the connection's rooms

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::actors::connection::ConnectionHandle;
use crate::actors::room::{ModerationAction, RoomActor, RoomActorHandle};
use crate::errors::ScError;
use crate::observability::CoordinatorMetrics;
use crate::protocol::{ClientEvent, ServerEvent};
use crate::registry::ConnectionRegistry;

/// Coordinator mailbox buffer.
const COORDINATOR_CHANNEL_BUFFER: usize = 1024;

/// Messages handled by the coordinator.
#[derive(Debug)]
pub enum CoordinatorMessage {
    /// Transport reports a new live connection.
    ConnectionOpened {
        connection_id: String,
        handle: ConnectionHandle,
    },
    /// An event parsed off a connection's inbound stream.
    ClientEvent {
        connection_id: String,
        event: ClientEvent,
    },
    /// Transport reports a connection as lost.
    ConnectionClosed { connection_id: String },
    /// Look up a room's actor handle (status and tests).
    GetRoom {
        room_id: String,
        respond_to: oneshot::Sender<Option<RoomActorHandle>>,
    },
    /// Coordinator-wide status snapshot.
    GetStatus {
        respond_to: oneshot::Sender<CoordinatorStatus>,
    },
}

/// Point-in-time coordinator status.
#[derive(Debug, Clone)]
pub struct CoordinatorStatus {
    /// Controller instance ID.
    pub controller_id: String,
    /// Rooms currently in the store.
    pub active_rooms: usize,
    /// Live connections on the switchboard.
    pub active_connections: usize,
    /// Registered participant identities.
    pub registered_identities: usize,
}

/// Handle to the coordinator. This is the public interface the transport
/// layer (and tests) drive.
#[derive(Clone)]
pub struct RoomCoordinatorHandle {
    sender: mpsc::Sender<CoordinatorMessage>,
    cancel_token: CancellationToken,
}

impl RoomCoordinatorHandle {
    /// Spawn the coordinator actor and return a handle to it.
    #[must_use]
    pub fn new(controller_id: String, metrics: Arc<CoordinatorMetrics>) -> Self {
        let (sender, receiver) = mpsc::channel(COORDINATOR_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor =
            RoomCoordinatorActor::new(controller_id, receiver, cancel_token.clone(), metrics);
        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    /// Announce a new live connection and its outbound handle.
    ///
    /// # Errors
    ///
    /// [`ScError::Internal`] if the coordinator is gone.
    pub async fn connection_opened(
        &self,
        connection_id: String,
        handle: ConnectionHandle,
    ) -> Result<(), ScError> {
        self.send(CoordinatorMessage::ConnectionOpened {
            connection_id,
            handle,
        })
        .await
    }

    /// Route one inbound client event.
    ///
    /// # Errors
    ///
    /// [`ScError::Internal`] if the coordinator is gone.
    pub async fn client_event(
        &self,
        connection_id: String,
        event: ClientEvent,
    ) -> Result<(), ScError> {
        self.send(CoordinatorMessage::ClientEvent {
            connection_id,
            event,
        })
        .await
    }

    /// Report a connection as lost. Idempotent: a second report for the
    /// same connection identity finds nothing and does nothing.
    ///
    /// # Errors
    ///
    /// [`ScError::Internal`] if the coordinator is gone.
    pub async fn connection_closed(&self, connection_id: String) -> Result<(), ScError> {
        self.send(CoordinatorMessage::ConnectionClosed { connection_id })
            .await
    }

    /// Get a room's actor handle, if the room exists.
    ///
    /// # Errors
    ///
    /// [`ScError::Internal`] if the coordinator is gone.
    pub async fn room(&self, room_id: String) -> Result<Option<RoomActorHandle>, ScError> {
        let (tx, rx) = oneshot::channel();
        self.send(CoordinatorMessage::GetRoom {
            room_id,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| ScError::Internal(format!("response receive failed: {e}")))
    }

    /// Get the coordinator status.
    ///
    /// # Errors
    ///
    /// [`ScError::Internal`] if the coordinator is gone.
    pub async fn status(&self) -> Result<CoordinatorStatus, ScError> {
        let (tx, rx) = oneshot::channel();
        self.send(CoordinatorMessage::GetStatus { respond_to: tx })
            .await?;

        rx.await
            .map_err(|e| ScError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the coordinator and, through child tokens, every room actor
    /// and transport session.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the coordinator is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Get a child token for transport sessions and servers.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    async fn send(&self, message: CoordinatorMessage) -> Result<(), ScError> {
        self.sender
            .send(message)
            .await
            .map_err(|e| ScError::Internal(format!("coordinator channel send failed: {e}")))
    }
}

/// Room store entry. `host_connection_id` and `authorized` are immutable
/// for the room's lifetime; live membership lives in the room actor.
struct StoredRoom {
    host_connection_id: String,
    authorized: HashSet<String>,
    handle: RoomActorHandle,
    task_handle: JoinHandle<()>,
}

/// The `RoomCoordinatorActor` implementation.
pub struct RoomCoordinatorActor {
    controller_id: String,
    receiver: mpsc::Receiver<CoordinatorMessage>,
    cancel_token: CancellationToken,
    /// Room store.
    rooms: HashMap<String, StoredRoom>,
    /// Identity <-> connection registry.
    registry: ConnectionRegistry,
    /// Switchboard: every live connection's outbound handle.
    connections: HashMap<String, ConnectionHandle>,
    /// Rooms each connection has been admitted to.
    rooms_by_connection: HashMap<String, HashSet<String>>,
    metrics: Arc<CoordinatorMetrics>,
}

impl RoomCoordinatorActor {
    fn new(
        controller_id: String,
        receiver: mpsc::Receiver<CoordinatorMessage>,
        cancel_token: CancellationToken,
        metrics: Arc<CoordinatorMetrics>,
    ) -> Self {
        Self {
            controller_id,
            receiver,
            cancel_token,
            rooms: HashMap::new(),
            registry: ConnectionRegistry::new(),
            connections: HashMap::new(),
            rooms_by_connection: HashMap::new(),
            metrics,
        }
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "sc.coordinator", fields(controller_id = %self.controller_id))]
    async fn run(mut self) {
        info!(
            target: "sc.coordinator",
            controller_id = %self.controller_id,
            "RoomCoordinatorActor started"
        );

        loop {
            self.check_room_health();

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "sc.coordinator",
                        controller_id = %self.controller_id,
                        "RoomCoordinatorActor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message),
                        None => {
                            info!(
                                target: "sc.coordinator",
                                controller_id = %self.controller_id,
                                "RoomCoordinatorActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "sc.coordinator",
            controller_id = %self.controller_id,
            rooms_remaining = self.rooms.len(),
            "RoomCoordinatorActor stopped"
        );
    }

    fn handle_message(&mut self, message: CoordinatorMessage) {
        match message {
            CoordinatorMessage::ConnectionOpened {
                connection_id,
                handle,
            } => self.handle_connection_opened(connection_id, handle),

            CoordinatorMessage::ClientEvent {
                connection_id,
                event,
            } => {
                self.metrics.record_event();
                self.handle_client_event(&connection_id, event);
            }

            CoordinatorMessage::ConnectionClosed { connection_id } => {
                self.handle_connection_closed(&connection_id);
            }

            CoordinatorMessage::GetRoom {
                room_id,
                respond_to,
            } => {
                let handle = self.rooms.get(&room_id).map(|room| room.handle.clone());
                let _ = respond_to.send(handle);
            }

            CoordinatorMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(CoordinatorStatus {
                    controller_id: self.controller_id.clone(),
                    active_rooms: self.rooms.len(),
                    active_connections: self.connections.len(),
                    registered_identities: self.registry.len(),
                });
            }
        }
    }

    /// Route one client event to exactly one component path.
    fn handle_client_event(&mut self, connection_id: &str, event: ClientEvent) {
        match event {
            ClientEvent::JoinRoom {
                participant_identity,
                room_id,
                is_host_claim,
                authorized_list,
            } => self.handle_join(
                connection_id,
                participant_identity,
                room_id,
                is_host_claim,
                authorized_list,
            ),

            ClientEvent::SendOffer {
                target_connection_id,
                origin_connection_id,
                payload,
            } => self.relay_offer(&target_connection_id, &origin_connection_id, payload),

            ClientEvent::SendAnswer {
                payload,
                origin_connection_id,
            } => self.relay_answer(connection_id, &origin_connection_id, payload),

            ClientEvent::ChatMessage {
                room_id,
                message,
                sender_identity,
            } => self.route_chat(&room_id, sender_identity, message),

            ClientEvent::HostMute {
                target_connection_id,
            } => self.handle_moderation(connection_id, ModerationAction::Mute, &target_connection_id),

            ClientEvent::HostBlock {
                target_connection_id,
            } => {
                self.handle_moderation(connection_id, ModerationAction::Block, &target_connection_id);
            }

            ClientEvent::HostRemove {
                target_connection_id,
            } => {
                self.handle_moderation(
                    connection_id,
                    ModerationAction::Remove,
                    &target_connection_id,
                );
            }
        }
    }

    fn handle_connection_opened(&mut self, connection_id: String, handle: ConnectionHandle) {
        debug!(
            target: "sc.coordinator",
            connection_id = %connection_id,
            "Connection opened"
        );
        self.connections.insert(connection_id, handle);
        self.metrics.connection_opened();
    }

    /// Access Controller: decide admission, then hand presence fan-out to
    /// the room actor. A rejected join is terminal for the attempt; the
    /// caller must re-request with corrected parameters.
    fn handle_join(
        &mut self,
        connection_id: &str,
        participant_identity: String,
        room_id: String,
        is_host_claim: bool,
        authorized_list: Option<Vec<String>>,
    ) {
        // Room creation: first host-claim join with a list, for an unknown
        // room id. The list is taken verbatim; a host that forgets itself
        // is rejected below like anyone else.
        if is_host_claim && !self.rooms.contains_key(&room_id) {
            if let Some(list) = authorized_list {
                self.create_room(&room_id, connection_id, list);
            }
        }

        let Some(room) = self.rooms.get(&room_id) else {
            debug!(
                target: "sc.coordinator",
                connection_id = %connection_id,
                room_id = %room_id,
                "Join rejected: room not found"
            );
            self.reject(connection_id, &ScError::RoomNotFound);
            return;
        };

        if !room.authorized.contains(&participant_identity) {
            debug!(
                target: "sc.coordinator",
                connection_id = %connection_id,
                room_id = %room_id,
                "Join rejected: not on the allow-list"
            );
            self.reject(connection_id, &ScError::NotAuthorized);
            return;
        }
        let room_handle = room.handle.clone();

        if let Err(err) = self.registry.register(&participant_identity, connection_id) {
            debug!(
                target: "sc.coordinator",
                connection_id = %connection_id,
                room_id = %room_id,
                "Join rejected: identity bound to another connection"
            );
            self.reject(connection_id, &err);
            return;
        }

        let Some(handle) = self.connections.get(connection_id) else {
            // The connection died between parse and routing; undo the
            // registration so the identity is not orphaned.
            self.registry.remove_connection(connection_id);
            return;
        };

        self.rooms_by_connection
            .entry(connection_id.to_string())
            .or_default()
            .insert(room_id.clone());

        room_handle.admit(
            connection_id.to_string(),
            participant_identity,
            handle.clone(),
        );

        info!(
            target: "sc.coordinator",
            connection_id = %connection_id,
            room_id = %room_id,
            "Join admitted"
        );
    }

    fn create_room(&mut self, room_id: &str, host_connection_id: &str, authorized: Vec<String>) {
        let (handle, task_handle) = RoomActor::spawn(
            room_id.to_string(),
            host_connection_id.to_string(),
            self.cancel_token.child_token(),
        );

        self.rooms.insert(
            room_id.to_string(),
            StoredRoom {
                host_connection_id: host_connection_id.to_string(),
                authorized: authorized.into_iter().collect(),
                handle,
                task_handle,
            },
        );
        self.metrics.room_created();

        info!(
            target: "sc.coordinator",
            room_id = %room_id,
            host_connection_id = %host_connection_id,
            total_rooms = self.rooms.len(),
            "Room created"
        );
    }

    /// Signal Relay: deliver an offer envelope, enriched with the origin's
    /// identity as registered right now. No admission check; an unknown
    /// target means the peer is gone and the event is dropped.
    fn relay_offer(
        &self,
        target_connection_id: &str,
        origin_connection_id: &str,
        payload: serde_json::Value,
    ) {
        let Some(target) = self.connections.get(target_connection_id) else {
            debug!(
                target: "sc.coordinator",
                target_connection_id = %target_connection_id,
                "Offer dropped: target not live"
            );
            return;
        };

        let origin_participant_identity = self
            .registry
            .identity_of(origin_connection_id)
            .map(String::from);

        target.enqueue(ServerEvent::ReceivingOffer {
            payload,
            origin_connection_id: origin_connection_id.to_string(),
            origin_participant_identity,
        });
    }

    /// Signal Relay: deliver an answer back to the offer's origin.
    fn relay_answer(
        &self,
        responding_connection_id: &str,
        origin_connection_id: &str,
        payload: serde_json::Value,
    ) {
        let Some(target) = self.connections.get(origin_connection_id) else {
            debug!(
                target: "sc.coordinator",
                target_connection_id = %origin_connection_id,
                "Answer dropped: target not live"
            );
            return;
        };

        target.enqueue(ServerEvent::ReceivingAnswer {
            payload,
            responding_connection_id: responding_connection_id.to_string(),
        });
    }

    /// Moderation Controller gate. Non-host attempts produce no observable
    /// effect at all - fail closed, nothing leaks to unauthorized callers.
    fn handle_moderation(
        &mut self,
        requesting_connection_id: &str,
        action: ModerationAction,
        target_connection_id: &str,
    ) {
        let Some(room_id) = self
            .rooms_by_connection
            .get(requesting_connection_id)
            .and_then(|rooms| rooms.iter().next())
            .cloned()
        else {
            debug!(
                target: "sc.coordinator",
                connection_id = %requesting_connection_id,
                "Moderation ignored: requester is in no room"
            );
            return;
        };

        let Some(room) = self.rooms.get(&room_id) else {
            return;
        };

        if room.host_connection_id != requesting_connection_id {
            debug!(
                target: "sc.coordinator",
                connection_id = %requesting_connection_id,
                room_id = %room_id,
                "Moderation ignored: requester is not the host"
            );
            return;
        }

        room.handle.moderate(action, target_connection_id.to_string());

        if action == ModerationAction::Remove {
            self.unindex(target_connection_id, &room_id);
        }
    }

    fn route_chat(&self, room_id: &str, sender_identity: String, message: String) {
        let Some(room) = self.rooms.get(room_id) else {
            debug!(
                target: "sc.coordinator",
                room_id = %room_id,
                "Chat dropped: unknown room"
            );
            return;
        };
        room.handle.chat(sender_identity, message);
    }

    /// Session Teardown. Idempotent: the switchboard entry is the guard -
    /// once it is gone, a repeated loss report finds nothing to do.
    fn handle_connection_closed(&mut self, connection_id: &str) {
        if self.connections.remove(connection_id).is_none() {
            debug!(
                target: "sc.coordinator",
                connection_id = %connection_id,
                "Teardown for unknown connection ignored"
            );
            return;
        }

        // Membership first: remaining members in every room observe the
        // departure, then the registry entry is purged.
        if let Some(room_ids) = self.rooms_by_connection.remove(connection_id) {
            for room_id in &room_ids {
                if let Some(room) = self.rooms.get(room_id) {
                    room.handle.leave(connection_id.to_string());
                }
            }
        }

        let identity = self.registry.remove_connection(connection_id);
        self.metrics.connection_closed();

        info!(
            target: "sc.coordinator",
            connection_id = %connection_id,
            participant_identity = identity.as_deref().unwrap_or("<unregistered>"),
            "Connection torn down"
        );
    }

    fn unindex(&mut self, connection_id: &str, room_id: &str) {
        if let Some(rooms) = self.rooms_by_connection.get_mut(connection_id) {
            rooms.remove(room_id);
            if rooms.is_empty() {
                self.rooms_by_connection.remove(connection_id);
            }
        }
    }

    fn reject(&self, connection_id: &str, err: &ScError) {
        if let Some(handle) = self.connections.get(connection_id) {
            handle.enqueue(ServerEvent::RoomError {
                reason: err.reason().to_string(),
            });
        }
    }

    /// Detect room actors that terminated on their own (a panic - rooms
    /// otherwise only exit via cancellation). The room is dropped from the
    /// store; members keep their connections.
    fn check_room_health(&mut self) {
        let finished: Vec<String> = self
            .rooms
            .iter()
            .filter(|(_, room)| room.task_handle.is_finished())
            .map(|(room_id, _)| room_id.clone())
            .collect();

        for room_id in finished {
            if self.rooms.remove(&room_id).is_some() {
                error!(
                    target: "sc.coordinator",
                    room_id = %room_id,
                    "RoomActor terminated unexpectedly, room dropped from store"
                );
                self.metrics.room_removed();
            }
        }
    }

    /// Cancellation has already propagated to room actors through their
    /// child tokens; wait for them to drain.
    async fn graceful_shutdown(&mut self) {
        info!(
            target: "sc.coordinator",
            controller_id = %self.controller_id,
            rooms = self.rooms.len(),
            connections = self.connections.len(),
            "Performing graceful shutdown"
        );

        for (room_id, room) in self.rooms.drain() {
            match tokio::time::timeout(std::time::Duration::from_secs(5), room.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "sc.coordinator",
                        room_id = %room_id,
                        "RoomActor completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "sc.coordinator",
                        room_id = %room_id,
                        error = ?e,
                        "RoomActor task failed during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "sc.coordinator",
                        room_id = %room_id,
                        "RoomActor shutdown timed out"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    fn test_coordinator() -> RoomCoordinatorHandle {
        RoomCoordinatorHandle::new("sc-test".to_string(), CoordinatorMetrics::new())
    }

    struct TestClient {
        connection_id: String,
        rx: mpsc::UnboundedReceiver<ServerEvent>,
    }

    async fn connect(coordinator: &RoomCoordinatorHandle, connection_id: &str) -> TestClient {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(
            connection_id.to_string(),
            tx,
            coordinator.child_token(),
        );
        coordinator
            .connection_opened(connection_id.to_string(), handle)
            .await
            .unwrap();
        TestClient {
            connection_id: connection_id.to_string(),
            rx,
        }
    }

    async fn next_event(client: &mut TestClient) -> ServerEvent {
        timeout(Duration::from_secs(1), client.rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed")
    }

    async fn join(
        coordinator: &RoomCoordinatorHandle,
        client: &TestClient,
        identity: &str,
        room_id: &str,
        is_host_claim: bool,
        authorized_list: Option<Vec<String>>,
    ) {
        coordinator
            .client_event(
                client.connection_id.clone(),
                ClientEvent::JoinRoom {
                    participant_identity: identity.to_string(),
                    room_id: room_id.to_string(),
                    is_host_claim,
                    authorized_list,
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_join_unknown_room_rejected() {
        let coordinator = test_coordinator();
        let mut client = connect(&coordinator, "conn-1").await;

        join(&coordinator, &client, "bob@x.com", "nowhere", false, None).await;

        match next_event(&mut client).await {
            ServerEvent::RoomError { reason } => assert_eq!(reason, "room-not-found"),
            other => panic!("expected room-error, got {other:?}"),
        }

        coordinator.cancel();
    }

    #[tokio::test]
    async fn test_host_claim_creates_room_and_admits() {
        let coordinator = test_coordinator();
        let mut host = connect(&coordinator, "host-conn").await;

        join(
            &coordinator,
            &host,
            "host@x.com",
            "abc",
            true,
            Some(vec!["host@x.com".to_string()]),
        )
        .await;

        match next_event(&mut host).await {
            ServerEvent::AllPeers { peers } => assert!(peers.is_empty()),
            other => panic!("expected all-peers, got {other:?}"),
        }
        match next_event(&mut host).await {
            ServerEvent::PeerJoined { is_host, .. } => assert!(is_host),
            other => panic!("expected peer-joined, got {other:?}"),
        }

        let status = coordinator.status().await.unwrap();
        assert_eq!(status.active_rooms, 1);
        assert_eq!(status.registered_identities, 1);

        coordinator.cancel();
    }

    #[tokio::test]
    async fn test_host_claim_without_list_does_not_create() {
        let coordinator = test_coordinator();
        let mut client = connect(&coordinator, "conn-1").await;

        join(&coordinator, &client, "host@x.com", "abc", true, None).await;

        match next_event(&mut client).await {
            ServerEvent::RoomError { reason } => assert_eq!(reason, "room-not-found"),
            other => panic!("expected room-error, got {other:?}"),
        }

        coordinator.cancel();
    }

    #[tokio::test]
    async fn test_host_omitted_from_own_list_is_rejected() {
        // The controller takes the list verbatim and does not auto-add the
        // creator.
        let coordinator = test_coordinator();
        let mut host = connect(&coordinator, "host-conn").await;

        join(
            &coordinator,
            &host,
            "host@x.com",
            "abc",
            true,
            Some(vec!["bob@x.com".to_string()]),
        )
        .await;

        match next_event(&mut host).await {
            ServerEvent::RoomError { reason } => assert_eq!(reason, "not-authorized"),
            other => panic!("expected room-error, got {other:?}"),
        }

        // The room still exists for bob.
        let status = coordinator.status().await.unwrap();
        assert_eq!(status.active_rooms, 1);

        coordinator.cancel();
    }

    #[tokio::test]
    async fn test_host_claim_for_existing_room_does_not_replace_list() {
        let coordinator = test_coordinator();
        let mut host = connect(&coordinator, "host-conn").await;
        let mut eve = connect(&coordinator, "eve-conn").await;

        join(
            &coordinator,
            &host,
            "host@x.com",
            "abc",
            true,
            Some(vec!["host@x.com".to_string()]),
        )
        .await;
        let _ = next_event(&mut host).await;
        let _ = next_event(&mut host).await;

        // Eve claims host on the same room id with herself on the list;
        // the existing room's allow-list is immutable.
        join(
            &coordinator,
            &eve,
            "eve@x.com",
            "abc",
            true,
            Some(vec!["eve@x.com".to_string()]),
        )
        .await;

        match next_event(&mut eve).await {
            ServerEvent::RoomError { reason } => assert_eq!(reason, "not-authorized"),
            other => panic!("expected room-error, got {other:?}"),
        }

        coordinator.cancel();
    }

    #[tokio::test]
    async fn test_identity_in_use_rejected_and_first_session_kept() {
        let coordinator = test_coordinator();
        let mut first = connect(&coordinator, "conn-1").await;
        let mut second = connect(&coordinator, "conn-2").await;

        join(
            &coordinator,
            &first,
            "host@x.com",
            "abc",
            true,
            Some(vec!["host@x.com".to_string()]),
        )
        .await;
        let _ = next_event(&mut first).await;
        let _ = next_event(&mut first).await;

        join(&coordinator, &second, "host@x.com", "abc", false, None).await;

        match next_event(&mut second).await {
            ServerEvent::RoomError { reason } => assert_eq!(reason, "identity-in-use"),
            other => panic!("expected room-error, got {other:?}"),
        }

        // First connection is still a member.
        let room = coordinator.room("abc".to_string()).await.unwrap().unwrap();
        let state = room.state().await.unwrap();
        assert!(state.contains("conn-1"));
        assert!(!state.contains("conn-2"));

        coordinator.cancel();
    }

    #[tokio::test]
    async fn test_relay_offer_enriches_identity() {
        let coordinator = test_coordinator();
        let mut host = connect(&coordinator, "host-conn").await;
        let mut bob = connect(&coordinator, "bob-conn").await;

        join(
            &coordinator,
            &host,
            "host@x.com",
            "abc",
            true,
            Some(vec!["host@x.com".to_string(), "bob@x.com".to_string()]),
        )
        .await;
        join(&coordinator, &bob, "bob@x.com", "abc", false, None).await;
        let _ = next_event(&mut host).await; // all-peers
        let _ = next_event(&mut host).await; // own peer-joined
        let _ = next_event(&mut host).await; // bob's peer-joined
        let _ = next_event(&mut bob).await;
        let _ = next_event(&mut bob).await;

        let payload = serde_json::json!({ "sdp": "v=0", "type": "offer" });
        coordinator
            .client_event(
                bob.connection_id.clone(),
                ClientEvent::SendOffer {
                    target_connection_id: "host-conn".to_string(),
                    origin_connection_id: "bob-conn".to_string(),
                    payload: payload.clone(),
                },
            )
            .await
            .unwrap();

        match next_event(&mut host).await {
            ServerEvent::ReceivingOffer {
                payload: received,
                origin_connection_id,
                origin_participant_identity,
            } => {
                assert_eq!(received, payload);
                assert_eq!(origin_connection_id, "bob-conn");
                assert_eq!(origin_participant_identity.as_deref(), Some("bob@x.com"));
            }
            other => panic!("expected receiving-offer, got {other:?}"),
        }

        coordinator.cancel();
    }

    #[tokio::test]
    async fn test_relay_answer_routes_to_offer_origin() {
        let coordinator = test_coordinator();
        let mut host = connect(&coordinator, "host-conn").await;
        let bob = connect(&coordinator, "bob-conn").await;

        let payload = serde_json::json!({ "sdp": "v=0", "type": "answer" });
        coordinator
            .client_event(
                bob.connection_id.clone(),
                ClientEvent::SendAnswer {
                    payload: payload.clone(),
                    origin_connection_id: "host-conn".to_string(),
                },
            )
            .await
            .unwrap();

        match next_event(&mut host).await {
            ServerEvent::ReceivingAnswer {
                payload: received,
                responding_connection_id,
            } => {
                assert_eq!(received, payload);
                assert_eq!(responding_connection_id, "bob-conn");
            }
            other => panic!("expected receiving-answer, got {other:?}"),
        }

        coordinator.cancel();
    }

    #[tokio::test]
    async fn test_relay_to_dead_target_is_dropped() {
        let coordinator = test_coordinator();
        let bob = connect(&coordinator, "bob-conn").await;

        coordinator
            .client_event(
                bob.connection_id.clone(),
                ClientEvent::SendOffer {
                    target_connection_id: "gone-conn".to_string(),
                    origin_connection_id: "bob-conn".to_string(),
                    payload: serde_json::json!({}),
                },
            )
            .await
            .unwrap();

        // Nothing observable anywhere; the coordinator keeps running.
        let status = coordinator.status().await.unwrap();
        assert_eq!(status.active_connections, 1);

        coordinator.cancel();
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let coordinator = test_coordinator();
        let mut host = connect(&coordinator, "host-conn").await;
        let mut bob = connect(&coordinator, "bob-conn").await;

        join(
            &coordinator,
            &host,
            "host@x.com",
            "abc",
            true,
            Some(vec!["host@x.com".to_string(), "bob@x.com".to_string()]),
        )
        .await;
        join(&coordinator, &bob, "bob@x.com", "abc", false, None).await;
        let _ = next_event(&mut host).await;
        let _ = next_event(&mut host).await;
        let _ = next_event(&mut host).await;
        let _ = next_event(&mut bob).await;
        let _ = next_event(&mut bob).await;

        coordinator
            .connection_closed("bob-conn".to_string())
            .await
            .unwrap();
        coordinator
            .connection_closed("bob-conn".to_string())
            .await
            .unwrap();

        // Exactly one peer-left.
        match next_event(&mut host).await {
            ServerEvent::PeerLeft { connection_id } => assert_eq!(connection_id, "bob-conn"),
            other => panic!("expected peer-left, got {other:?}"),
        }
        assert!(timeout(Duration::from_millis(50), host.rx.recv())
            .await
            .is_err());

        let status = coordinator.status().await.unwrap();
        assert_eq!(status.registered_identities, 1);
        assert_eq!(status.active_connections, 1);

        coordinator.cancel();
    }

    #[tokio::test]
    async fn test_moderation_from_non_host_is_silent() {
        let coordinator = test_coordinator();
        let mut host = connect(&coordinator, "host-conn").await;
        let mut bob = connect(&coordinator, "bob-conn").await;

        join(
            &coordinator,
            &host,
            "host@x.com",
            "abc",
            true,
            Some(vec!["host@x.com".to_string(), "bob@x.com".to_string()]),
        )
        .await;
        join(&coordinator, &bob, "bob@x.com", "abc", false, None).await;
        let _ = next_event(&mut host).await;
        let _ = next_event(&mut host).await;
        let _ = next_event(&mut host).await;
        let _ = next_event(&mut bob).await;
        let _ = next_event(&mut bob).await;

        coordinator
            .client_event(
                bob.connection_id.clone(),
                ClientEvent::HostMute {
                    target_connection_id: "host-conn".to_string(),
                },
            )
            .await
            .unwrap();

        // No broadcast to anyone.
        assert!(timeout(Duration::from_millis(50), host.rx.recv())
            .await
            .is_err());
        assert!(timeout(Duration::from_millis(50), bob.rx.recv())
            .await
            .is_err());

        coordinator.cancel();
    }
}
