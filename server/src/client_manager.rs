//! Connection registry for the server loop.
//!
//! Every accepted WebSocket gets a [`Connection`] entry holding the sending
//! half of its writer task. Ids come from a counter that lives as long as the
//! process and are never reused. Player ids are derived from them.
//!
//! Input is coalesced per connection: the latest direction wins and an attack
//! request stays set until the next tick consumes it.

use log::{debug, info, warn};
use serde::Serialize;
use shared::{Envelope, PlayerInputPayload};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

/// Opaque per-socket identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Work for a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// One encoded envelope, sent as a binary frame
    Frame(Vec<u8>),
    Ping,
    Close,
}

#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    /// Room identity of whoever is on this socket
    pub player_id: String,
    pub addr: SocketAddr,
    /// Last time any frame arrived on this socket
    pub last_seen: Instant,
    sender: UnboundedSender<Outbound>,
    pending_input: Option<PlayerInputPayload>,
}

impl Connection {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: UnboundedSender<Outbound>) -> Self {
        Self {
            id,
            player_id: format!("player_{}", id.0),
            addr,
            last_seen: Instant::now(),
            sender,
            pending_input: None,
        }
    }

    /// Replaces the pending input, keeping an attack that has not been applied yet.
    pub fn set_input(&mut self, input: PlayerInputPayload) {
        self.last_seen = Instant::now();
        let action = input
            .action
            .or_else(|| self.pending_input.as_ref().and_then(|pending| pending.action));
        self.pending_input = Some(PlayerInputPayload { action, ..input });
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    fn push(&self, outbound: Outbound) -> bool {
        self.sender.send(outbound).is_ok()
    }
}

pub struct ClientManager {
    connections: HashMap<ConnectionId, Connection>,
    next_connection_id: u32,
    max_connections: usize,
}

impl ClientManager {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: HashMap::new(),
            next_connection_id: 1,
            max_connections,
        }
    }

    /// Registers a new socket. Returns None when the server is at capacity.
    pub fn register(&mut self, addr: SocketAddr, sender: UnboundedSender<Outbound>) -> Option<ConnectionId> {
        if self.connections.len() >= self.max_connections {
            return None;
        }

        let id = ConnectionId(self.next_connection_id);
        self.next_connection_id += 1;

        let connection = Connection::new(id, addr, sender);
        info!("Connection {} from {} registered as {}", id, addr, connection.player_id);
        self.connections.insert(id, connection);
        Some(id)
    }

    /// Removes a connection, returning it if it was still registered.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Connection> {
        let removed = self.connections.remove(&id);
        if let Some(connection) = &removed {
            info!("Connection {} ({}) unregistered", id, connection.player_id);
        }
        removed
    }

    pub fn player_id(&self, id: ConnectionId) -> Option<&str> {
        self.connections.get(&id).map(|c| c.player_id.as_str())
    }

    pub fn find_by_player(&self, player_id: &str) -> Option<ConnectionId> {
        self.connections
            .values()
            .find(|c| c.player_id == player_id)
            .map(|c| c.id)
    }

    /// Encodes and sends one envelope. Unknown or closed connections are a logged no-op.
    pub fn send<M: Serialize>(&self, id: ConnectionId, envelope: &Envelope<M>) {
        match shared::encode(envelope) {
            Ok(bytes) => self.send_bytes(id, bytes),
            Err(e) => warn!("Failed to encode message for {}: {}", id, e),
        }
    }

    pub fn send_bytes(&self, id: ConnectionId, bytes: Vec<u8>) {
        match self.connections.get(&id) {
            Some(connection) => {
                if !connection.push(Outbound::Frame(bytes)) {
                    warn!("Dropped frame for closed connection {}", id);
                }
            }
            None => warn!("Dropped frame for unknown connection {}", id),
        }
    }

    /// Encodes once and sends to every connection except `exclude`.
    /// Returns how many writers accepted the frame.
    pub fn broadcast<M: Serialize>(&self, envelope: &Envelope<M>, exclude: Option<ConnectionId>) -> usize {
        let bytes = match shared::encode(envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to encode broadcast: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        for connection in self.connections.values() {
            if Some(connection.id) == exclude {
                continue;
            }
            if connection.push(Outbound::Frame(bytes.clone())) {
                delivered += 1;
            } else {
                warn!("Dropped broadcast for closed connection {}", connection.id);
            }
        }
        delivered
    }

    /// Marks a connection as alive.
    pub fn touch(&mut self, id: ConnectionId) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.last_seen = Instant::now();
        }
    }

    pub fn set_input(&mut self, id: ConnectionId, input: PlayerInputPayload) -> bool {
        match self.connections.get_mut(&id) {
            Some(connection) => {
                connection.set_input(input);
                true
            }
            None => false,
        }
    }

    /// Takes the coalesced input of every connection, ordered by connection id.
    pub fn take_inputs(&mut self) -> Vec<(String, PlayerInputPayload)> {
        let mut inputs: Vec<(ConnectionId, String, PlayerInputPayload)> = self
            .connections
            .values_mut()
            .filter_map(|c| c.pending_input.take().map(|input| (c.id, c.player_id.clone(), input)))
            .collect();
        inputs.sort_by_key(|(id, _, _)| *id);
        inputs
            .into_iter()
            .map(|(_, player_id, input)| (player_id, input))
            .collect()
    }

    /// Removes connections that have been silent for longer than `timeout`
    /// and asks their writers to close.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<Connection> {
        if timeout.is_zero() {
            return Vec::new();
        }

        let timed_out: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.is_timed_out(timeout))
            .map(|c| c.id)
            .collect();

        let mut removed = Vec::new();
        for id in timed_out {
            if let Some(connection) = self.unregister(id) {
                warn!("Connection {} timed out", id);
                connection.push(Outbound::Close);
                removed.push(connection);
            }
        }
        removed
    }

    pub fn ping_all(&self) {
        for connection in self.connections.values() {
            if !connection.push(Outbound::Ping) {
                debug!("Ping skipped for closed connection {}", connection.id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ClientMessage, LeaveGamePayload, PlayerAction, ServerMessage, Vector2};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn register(manager: &mut ClientManager) -> (ConnectionId, UnboundedReceiver<Outbound>) {
        let (tx, rx) = unbounded_channel();
        (manager.register(test_addr(), tx).unwrap(), rx)
    }

    fn input(x: f32, action: Option<PlayerAction>) -> PlayerInputPayload {
        PlayerInputPayload {
            direction: Vector2::new(x, 0.0),
            action,
        }
    }

    #[test]
    fn test_connection_creation() {
        let (tx, _rx) = unbounded_channel();
        let connection = Connection::new(ConnectionId(3), test_addr(), tx);

        assert_eq!(connection.player_id, "player_3");
        assert_eq!(connection.addr, test_addr());
        assert!(connection.pending_input.is_none());
    }

    #[test]
    fn test_connection_timeout() {
        let (tx, _rx) = unbounded_channel();
        let mut connection = Connection::new(ConnectionId(1), test_addr(), tx);

        assert!(!connection.is_timed_out(Duration::from_secs(1)));
        connection.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(connection.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_ids_increase_and_are_not_reused() {
        let mut manager = ClientManager::new(4);
        let (first, _rx1) = register(&mut manager);
        let (second, _rx2) = register(&mut manager);
        assert_eq!(first, ConnectionId(1));
        assert_eq!(second, ConnectionId(2));

        manager.unregister(first);
        let (third, _rx3) = register(&mut manager);
        assert_eq!(third, ConnectionId(3));
        assert_eq!(manager.player_id(third), Some("player_3"));
    }

    #[test]
    fn test_register_max_capacity() {
        let mut manager = ClientManager::new(1);
        let (_id, _rx) = register(&mut manager);

        let (tx, _rx2) = unbounded_channel();
        assert!(manager.register(test_addr(), tx).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_unregister_twice() {
        let mut manager = ClientManager::new(2);
        let (id, _rx) = register(&mut manager);

        assert!(manager.unregister(id).is_some());
        assert!(manager.unregister(id).is_none());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_send_delivers_encoded_frame() {
        let mut manager = ClientManager::new(2);
        let (id, mut rx) = register(&mut manager);

        let envelope = Envelope::new(ServerMessage::PlayerLeft(shared::PlayerLeftPayload {
            player_id: "player_9".to_string(),
        }));
        manager.send(id, &envelope);

        match rx.try_recv() {
            Ok(Outbound::Frame(bytes)) => {
                let decoded: Envelope<ServerMessage> = shared::decode(&bytes).unwrap();
                assert_eq!(decoded, envelope);
            }
            other => panic!("Unexpected outbound {:?}", other),
        }
    }

    #[test]
    fn test_send_to_unknown_or_closed_is_noop() {
        let mut manager = ClientManager::new(2);
        let (id, rx) = register(&mut manager);
        drop(rx);

        let envelope = Envelope::new(ClientMessage::LeaveGame(LeaveGamePayload {}));
        manager.send(id, &envelope);
        manager.send(ConnectionId(99), &envelope);
        assert_eq!(manager.broadcast(&envelope, None), 0);
    }

    #[test]
    fn test_broadcast_excludes() {
        let mut manager = ClientManager::new(3);
        let (first, mut rx1) = register(&mut manager);
        let (_second, mut rx2) = register(&mut manager);

        let envelope = Envelope::new(ClientMessage::LeaveGame(LeaveGamePayload {}));
        assert_eq!(manager.broadcast(&envelope, Some(first)), 1);
        assert!(rx1.try_recv().is_err());
        assert!(matches!(rx2.try_recv(), Ok(Outbound::Frame(_))));
    }

    #[test]
    fn test_input_coalescing_keeps_attack() {
        let mut manager = ClientManager::new(2);
        let (id, _rx) = register(&mut manager);

        assert!(manager.set_input(id, input(1.0, Some(PlayerAction::Attack))));
        assert!(manager.set_input(id, input(-1.0, None)));

        let inputs = manager.take_inputs();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].0, "player_1");
        assert_eq!(inputs[0].1.direction.x, -1.0);
        assert_eq!(inputs[0].1.action, Some(PlayerAction::Attack));

        assert!(manager.take_inputs().is_empty());
        assert!(!manager.set_input(ConnectionId(42), input(1.0, None)));
    }

    #[test]
    fn test_take_inputs_ordered_by_connection() {
        let mut manager = ClientManager::new(3);
        let (first, _rx1) = register(&mut manager);
        let (second, _rx2) = register(&mut manager);

        manager.set_input(second, input(0.5, None));
        manager.set_input(first, input(1.0, None));

        let players: Vec<String> = manager.take_inputs().into_iter().map(|(p, _)| p).collect();
        assert_eq!(players, vec!["player_1", "player_2"]);
    }

    #[test]
    fn test_check_timeouts_closes_writer() {
        let mut manager = ClientManager::new(2);
        let (id, mut rx) = register(&mut manager);
        let (_fresh, _rx2) = register(&mut manager);

        manager.connections.get_mut(&id).unwrap().last_seen = Instant::now() - Duration::from_secs(30);

        let removed = manager.check_timeouts(Duration::from_secs(10));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, id);
        assert_eq!(manager.len(), 1);
        assert_eq!(rx.try_recv(), Ok(Outbound::Close));

        assert!(manager.check_timeouts(Duration::ZERO).is_empty());
    }

    #[test]
    fn test_find_by_player() {
        let mut manager = ClientManager::new(2);
        let (id, _rx) = register(&mut manager);
        assert_eq!(manager.find_by_player("player_1"), Some(id));
        assert_eq!(manager.find_by_player("player_7"), None);
    }
}
