//! The process-wide arena session.
//!
//! `Session` aggregates the connection table, the player registry and the
//! world object pool. It performs no I/O: each operation validates, mutates,
//! and reports which snapshots must go out. The session loop in
//! [`crate::network`] owns the only instance and applies one operation at a
//! time, which is what makes consumption linearizable.

use crate::config::ServerConfig;
use crate::connection_manager::{ConnectionManager, Outbound};
use crate::registry::PlayerRegistry;
use crate::world::ObjectPool;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{ClientMessage, MeshHandle, ObjectId, PlayerId, ServerMessage};
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// Which snapshots a mutation requires. Objects are always sent before players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Broadcast {
    pub objects: bool,
    pub players: bool,
}

impl Broadcast {
    pub const NONE: Broadcast = Broadcast {
        objects: false,
        players: false,
    };
    pub const PLAYERS: Broadcast = Broadcast {
        objects: false,
        players: true,
    };
    pub const BOTH: Broadcast = Broadcast {
        objects: true,
        players: true,
    };

    pub fn is_empty(&self) -> bool {
        !self.objects && !self.players
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted { player_id: PlayerId },
    Rejected,
}

pub struct Session {
    connections: ConnectionManager,
    registry: PlayerRegistry,
    pool: ObjectPool,
    rng: StdRng,
    revision: u64,
    growth_increment: f32,
    max_consume_distance: Option<f32>,
    new_round_when_empty: bool,
    accept_size_reports: bool,
    collectibles_per_round: usize,
}

impl Session {
    pub fn new(config: &ServerConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let pool = ObjectPool::generate(config.collectibles, config.hazards, &mut rng);

        Self {
            connections: ConnectionManager::new(config.max_players),
            registry: PlayerRegistry::new(),
            pool,
            rng,
            revision: 0,
            growth_increment: config.growth_increment,
            max_consume_distance: config.max_consume_distance,
            new_round_when_empty: config.new_round_when_empty,
            accept_size_reports: config.accept_size_reports,
            collectibles_per_round: config.collectibles,
        }
    }

    /// Admits a connection and spawns its player, or rejects it when full.
    pub fn join(&mut self, addr: SocketAddr, outbound: mpsc::Sender<Outbound>) -> Admission {
        match self.connections.admit(addr, outbound) {
            Some(player_id) => {
                self.registry.spawn(player_id, &mut self.rng);
                self.revision += 1;
                Admission::Admitted { player_id }
            }
            None => Admission::Rejected,
        }
    }

    pub fn activate(&mut self, player_id: PlayerId) -> bool {
        self.connections.activate(player_id)
    }

    /// Tears down a connection and its player. Unknown IDs are a no-op.
    pub fn leave(&mut self, player_id: PlayerId) -> Broadcast {
        let connection = self.connections.remove(player_id);
        let player = self.registry.remove(player_id);
        if connection.is_none() && player.is_none() {
            return Broadcast::NONE;
        }
        self.revision += 1;
        Broadcast::PLAYERS
    }

    /// Applies a message received on `player_id`'s own connection.
    pub fn apply(&mut self, player_id: PlayerId, message: ClientMessage) -> Broadcast {
        match message {
            ClientMessage::Move { x, z } => self.update_position(player_id, x, z),
            ClientMessage::Consume { object_id } => self.consume(player_id, object_id),
            ClientMessage::RegisterMesh { mesh_id, mesh_uuid } => {
                self.register_mesh(player_id, MeshHandle { mesh_id, mesh_uuid })
            }
            ClientMessage::ReportSize { size } => self.report_size(player_id, size),
            // Answered by the connection itself, never reach shared state.
            ClientMessage::Probe { .. } | ClientMessage::Leave => Broadcast::NONE,
        }
    }

    pub fn update_position(&mut self, player_id: PlayerId, x: f32, z: f32) -> Broadcast {
        if !self.registry.update_position(player_id, x, z) {
            return Broadcast::NONE;
        }
        self.revision += 1;
        Broadcast::PLAYERS
    }

    /// Consumes a collectible on behalf of `player_id`.
    ///
    /// The object removal and the growth are applied together before anything
    /// is broadcast, so no snapshot can show one without the other.
    pub fn consume(&mut self, player_id: PlayerId, object_id: ObjectId) -> Broadcast {
        let Some(player) = self.registry.get(player_id) else {
            return Broadcast::NONE;
        };

        if let Some(limit) = self.max_consume_distance {
            let Some(object) = self.pool.collectible(object_id) else {
                return Broadcast::NONE;
            };
            let distance = player.distance_to(object.x, object.z);
            if distance > limit + player.size {
                debug!(
                    "Player {} too far from object {} ({:.1} > {:.1})",
                    player_id,
                    object_id,
                    distance,
                    limit + player.size
                );
                return Broadcast::NONE;
            }
        }

        if self.pool.try_consume(object_id).is_none() {
            return Broadcast::NONE;
        }
        self.registry.grow(player_id, self.growth_increment);

        if self.new_round_when_empty && self.pool.collectible_count() == 0 {
            self.pool
                .scatter_collectibles(self.collectibles_per_round, &mut self.rng);
            info!(
                "Collectibles exhausted, started a new round with {}",
                self.pool.collectible_count()
            );
        }

        self.revision += 1;
        Broadcast::BOTH
    }

    pub fn register_mesh(&mut self, player_id: PlayerId, mesh: MeshHandle) -> Broadcast {
        if !self.registry.register_mesh(player_id, mesh) {
            return Broadcast::NONE;
        }
        self.revision += 1;
        Broadcast::PLAYERS
    }

    /// Honors a client-reported size only as growth, and only when size reports
    /// are enabled. Otherwise size changes through consumption alone.
    pub fn report_size(&mut self, player_id: PlayerId, size: f32) -> Broadcast {
        if !self.accept_size_reports {
            debug!("Ignoring size report from player {}", player_id);
            return Broadcast::NONE;
        }
        let Some(current) = self.registry.get(player_id).map(|player| player.size) else {
            return Broadcast::NONE;
        };
        if self.registry.grow(player_id, size - current).is_none() {
            return Broadcast::NONE;
        }
        self.revision += 1;
        Broadcast::PLAYERS
    }

    pub fn welcome(&self, player_id: PlayerId) -> ServerMessage {
        ServerMessage::Welcome {
            player_id,
            max_players: u32::try_from(self.connections.max_players()).unwrap_or(u32::MAX),
        }
    }

    pub fn players_snapshot(&self) -> ServerMessage {
        ServerMessage::PlayersSnapshot {
            revision: self.revision,
            players: self.registry.snapshot(),
        }
    }

    pub fn objects_snapshot(&self) -> ServerMessage {
        ServerMessage::ObjectsSnapshot {
            revision: self.revision,
            collectibles: self.pool.collectibles(),
            hazards: self.pool.hazards(),
        }
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &ObjectPool {
        &self.pool
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
