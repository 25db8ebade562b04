//! Snapshot fan-out to connected clients.
//!
//! Each snapshot is built once and shared by reference count; every
//! connection's writer encodes it in that connection's own encoding. Delivery
//! uses `try_send`, so a client that stops reading only loses its own messages.
//! The two snapshots of a consumption are queued all-or-nothing per connection.

use crate::connection_manager::{ConnectionManager, Outbound};
use crate::session::{Broadcast, Session};
use log::{debug, warn};
use shared::{PlayerId, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

#[derive(Debug, Default)]
pub struct Dispatcher {
    delivered: u64,
    dropped: u64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends whatever `broadcast` asks for, objects before players.
    pub fn dispatch(&mut self, session: &Session, broadcast: Broadcast) {
        match (broadcast.objects, broadcast.players) {
            (true, true) => {
                self.broadcast_both(session);
            }
            (true, false) => {
                self.broadcast_objects(session);
            }
            (false, true) => {
                self.broadcast_players(session);
            }
            (false, false) => {}
        }
    }

    /// Queues the objects snapshot then the players snapshot on every
    /// connection. A connection without room for both receives neither.
    pub fn broadcast_both(&mut self, session: &Session) -> usize {
        let objects: Outbound = Arc::new(session.objects_snapshot());
        let players: Outbound = Arc::new(session.players_snapshot());

        session
            .connections()
            .iter()
            .filter(|connection| {
                self.deliver_pair(connection.id, connection.outbound(), &objects, &players)
            })
            .count()
    }

    pub fn broadcast_players(&mut self, session: &Session) -> usize {
        self.fan_out(session.connections(), Arc::new(session.players_snapshot()))
    }

    pub fn broadcast_objects(&mut self, session: &Session) -> usize {
        self.fan_out(session.connections(), Arc::new(session.objects_snapshot()))
    }

    /// Queues one message for a single connection.
    pub fn send_to(&mut self, session: &Session, player_id: PlayerId, message: ServerMessage) -> bool {
        match session.connections().get(player_id) {
            Some(connection) => self.deliver(player_id, connection.outbound(), Arc::new(message)),
            None => false,
        }
    }

    fn fan_out(&mut self, connections: &ConnectionManager, message: Outbound) -> usize {
        connections
            .iter()
            .filter(|connection| self.deliver(connection.id, connection.outbound(), Arc::clone(&message)))
            .count()
    }

    fn deliver(
        &mut self,
        player_id: PlayerId,
        queue: &Sender<Outbound>,
        message: Outbound,
    ) -> bool {
        match queue.try_send(message) {
            Ok(()) => {
                self.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                warn!("Outbound queue full for connection {}, dropping message", player_id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Connection {} already closed its outbound queue", player_id);
                false
            }
        }
    }

    fn deliver_pair(
        &mut self,
        player_id: PlayerId,
        queue: &Sender<Outbound>,
        first: &Outbound,
        second: &Outbound,
    ) -> bool {
        let permits = queue
            .try_reserve()
            .and_then(|first_slot| queue.try_reserve().map(move |second_slot| (first_slot, second_slot)));

        match permits {
            Ok((first_slot, second_slot)) => {
                first_slot.send(Arc::clone(first));
                second_slot.send(Arc::clone(second));
                self.delivered += 2;
                true
            }
            Err(TrySendError::Full(())) => {
                self.dropped += 2;
                warn!(
                    "Outbound queue full for connection {}, dropping snapshot pair",
                    player_id
                );
                false
            }
            Err(TrySendError::Closed(())) => {
                debug!("Connection {} already closed its outbound queue", player_id);
                false
            }
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
