//! Connection tracking and admission control for the arena server
//!
//! This module owns the server-side view of every admitted connection:
//! - Capacity-bounded admission with unique, never-reused player IDs
//! - The per-connection lifecycle state machine
//! - Each connection's outbound queue, used by the dispatcher for fan-out
//!
//! Connections that are rejected never get an entry here, so the number of
//! tracked connections always equals the number of players in the registry.

use log::{info, warn};
use shared::{PlayerId, ServerMessage};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Messages queued for a single connection's writer
pub type Outbound = Arc<ServerMessage>;

/// Lifecycle of one connection
///
/// `Connecting -> Admitted -> Active -> Disconnected`, or `Connecting -> Rejected`.
/// Both `Disconnected` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Admitted,
    Active,
    Disconnected,
    Rejected,
}

impl ConnectionState {
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connecting, Admitted)
                | (Connecting, Rejected)
                | (Admitted, Active)
                | (Admitted, Disconnected)
                | (Active, Disconnected)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Rejected
        )
    }

    /// Moves to `next` if the transition is legal. Returns whether it happened.
    pub fn advance(&mut self, next: ConnectionState) -> bool {
        if self.can_transition_to(next) {
            *self = next;
            true
        } else {
            false
        }
    }
}

/// An admitted connection and the queue its writer drains
#[derive(Debug)]
pub struct Connection {
    pub id: PlayerId,
    pub addr: SocketAddr,
    pub state: ConnectionState,
    pub admitted_at: Instant,
    outbound: mpsc::Sender<Outbound>,
}

impl Connection {
    pub fn new(id: PlayerId, addr: SocketAddr, outbound: mpsc::Sender<Outbound>) -> Self {
        let mut state = ConnectionState::Connecting;
        state.advance(ConnectionState::Admitted);
        Self {
            id,
            addr,
            state,
            admitted_at: Instant::now(),
            outbound,
        }
    }

    pub fn outbound(&self) -> &mpsc::Sender<Outbound> {
        &self.outbound
    }
}

/// Tracks admitted connections and enforces the player capacity bound
pub struct ConnectionManager {
    connections: HashMap<PlayerId, Connection>,
    next_player_id: PlayerId,
    max_players: usize,
}

impl ConnectionManager {
    pub fn new(max_players: usize) -> Self {
        Self {
            connections: HashMap::new(),
            next_player_id: 1,
            max_players,
        }
    }

    /// Admits a connection if there is room.
    ///
    /// Returns the new player ID, or `None` when the arena is full. A rejected
    /// attempt consumes no ID and leaves no trace.
    pub fn admit(
        &mut self,
        addr: SocketAddr,
        outbound: mpsc::Sender<Outbound>,
    ) -> Option<PlayerId> {
        if self.is_full() {
            warn!(
                "Rejecting connection from {}: {} of {} slots in use",
                addr,
                self.connections.len(),
                self.max_players
            );
            return None;
        }

        let id = self.next_player_id;
        self.next_player_id += 1;

        info!("Connection {} admitted from {}", id, addr);
        self.connections
            .insert(id, Connection::new(id, addr, outbound));
        Some(id)
    }

    /// Marks an admitted connection as active once its initial state is queued
    pub fn activate(&mut self, id: PlayerId) -> bool {
        self.connections
            .get_mut(&id)
            .map(|connection| connection.state.advance(ConnectionState::Active))
            .unwrap_or(false)
    }

    /// Removes a connection, returning it in the `Disconnected` state.
    ///
    /// Removing an unknown or already-removed ID is a no-op.
    pub fn remove(&mut self, id: PlayerId) -> Option<Connection> {
        let mut connection = self.connections.remove(&id)?;
        connection.state.advance(ConnectionState::Disconnected);
        info!(
            "Connection {} from {} closed after {:.1}s",
            id,
            connection.addr,
            connection.admitted_at.elapsed().as_secs_f32()
        );
        Some(connection)
    }

    pub fn get(&self, id: PlayerId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn state(&self, id: PlayerId) -> Option<ConnectionState> {
        self.connections.get(&id).map(|connection| connection.state)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn is_full(&self) -> bool {
        self.connections.len() >= self.max_players
    }

    pub fn max_players(&self) -> usize {
        self.max_players
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

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn queue() -> mpsc::Sender<Outbound> {
        mpsc::channel(4).0
    }

    #[test]
    fn test_state_machine_happy_path() {
        let mut state = ConnectionState::Connecting;
        assert!(state.advance(ConnectionState::Admitted));
        assert!(state.advance(ConnectionState::Active));
        assert!(state.advance(ConnectionState::Disconnected));
        assert!(state.is_terminal());
    }

    #[test]
    fn test_state_machine_rejects_reentry() {
        let mut state = ConnectionState::Disconnected;
        assert!(!state.advance(ConnectionState::Active));
        assert_eq!(state, ConnectionState::Disconnected);

        let mut state = ConnectionState::Rejected;
        assert!(!state.advance(ConnectionState::Admitted));
        assert_eq!(state, ConnectionState::Rejected);
    }

    #[test]
    fn test_state_machine_no_skipping_admission() {
        assert!(!ConnectionState::Connecting.can_transition_to(ConnectionState::Active));
        assert!(!ConnectionState::Active.can_transition_to(ConnectionState::Rejected));
        assert!(ConnectionState::Admitted.can_transition_to(ConnectionState::Disconnected));
    }

    #[test]
    fn test_admit_assigns_sequential_ids() {
        let mut manager = ConnectionManager::new(3);
        assert_eq!(manager.admit(test_addr(), queue()), Some(1));
        assert_eq!(manager.admit(test_addr(), queue()), Some(2));
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.state(1), Some(ConnectionState::Admitted));
    }

    #[test]
    fn test_admit_at_capacity() {
        let mut manager = ConnectionManager::new(1);
        assert!(manager.admit(test_addr(), queue()).is_some());
        assert!(manager.is_full());
        assert!(manager.admit(test_addr(), queue()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_ids_not_reused_after_remove() {
        let mut manager = ConnectionManager::new(1);
        let first = manager.admit(test_addr(), queue()).unwrap();
        let removed = manager.remove(first).unwrap();
        assert_eq!(removed.state, ConnectionState::Disconnected);

        let second = manager.admit(test_addr(), queue()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_activate_and_remove() {
        let mut manager = ConnectionManager::new(2);
        let id = manager.admit(test_addr(), queue()).unwrap();
        assert!(manager.activate(id));
        assert!(!manager.activate(id));
        assert_eq!(manager.state(id), Some(ConnectionState::Active));

        assert!(manager.remove(id).is_some());
        assert!(manager.remove(id).is_none());
        assert!(manager.is_empty());
        assert!(!manager.activate(id));
    }
}
