//! Wire protocol and arena constants shared by the server and the headless client.
//!
//! Every message is an externally tagged enum with snake_case variant names, so
//! the same type travels as JSON in text frames and as bincode in binary frames.
//! See [`codec`] for the frame-level encode/decode helpers.

pub mod codec;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use codec::{Encoding, ProtocolError};

/// Collectibles are scattered over `[-ARENA_HALF_EXTENT, ARENA_HALF_EXTENT)` on both axes.
pub const ARENA_HALF_EXTENT: f32 = 100.0;
/// Hazards and player spawns use the inner `[-SPAWN_HALF_EXTENT, SPAWN_HALF_EXTENT)` square.
pub const SPAWN_HALF_EXTENT: f32 = 50.0;
pub const INITIAL_SIZE: f32 = 1.0;
pub const GROWTH_INCREMENT: f32 = 0.1;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_PLAYERS: usize = 20;
pub const DEFAULT_COLLECTIBLES: usize = 100;
pub const DEFAULT_HAZARDS: usize = 3;

/// How often a connected client sends a latency probe.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Connection-scoped player identity. Never reused within a server lifetime.
pub type PlayerId = u32;
/// Stable world-object identity, assigned once when the object is generated.
pub type ObjectId = u32;

/// Correlates a player with the mesh the rendering client draws for it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MeshHandle {
    pub mesh_id: u64,
    pub mesh_uuid: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub x: f32,
    pub z: f32,
    pub size: f32,
    pub mesh: Option<MeshHandle>,
}

impl Player {
    pub fn new(id: PlayerId, x: f32, z: f32) -> Self {
        Self {
            id,
            x,
            z,
            size: INITIAL_SIZE,
            mesh: None,
        }
    }

    pub fn distance_to(&self, x: f32, z: f32) -> f32 {
        let dx = self.x - x;
        let dz = self.z - z;
        (dx * dx + dz * dz).sqrt()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Collectible,
    Hazard,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WorldObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub x: f32,
    pub z: f32,
}

impl WorldObject {
    pub fn new(id: ObjectId, kind: ObjectKind, x: f32, z: f32) -> Self {
        Self { id, kind, x, z }
    }
}

/// Messages a client sends to the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ClientMessage {
    Move { x: f32, z: f32 },
    Consume { object_id: ObjectId },
    Probe { nonce: u64 },
    RegisterMesh { mesh_id: u64, mesh_uuid: String },
    /// Client-side view of its own size. Only growth is honored.
    ReportSize { size: f32 },
    Leave,
}

impl ClientMessage {
    /// Rejects payloads carrying NaN or infinite coordinates/sizes.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ClientMessage::Move { x, z } if !x.is_finite() || !z.is_finite() => {
                Err(ProtocolError::NonFinite("move"))
            }
            ClientMessage::ReportSize { size } if !size.is_finite() => {
                Err(ProtocolError::NonFinite("report_size"))
            }
            _ => Ok(()),
        }
    }
}

/// Messages the server sends to clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        player_id: PlayerId,
        max_players: u32,
    },
    AdmissionRejected {
        reason: String,
    },
    ProbeAck {
        nonce: u64,
    },
    PlayersSnapshot {
        revision: u64,
        players: Vec<Player>,
    },
    ObjectsSnapshot {
        revision: u64,
        collectibles: Vec<WorldObject>,
        hazards: Vec<WorldObject>,
    },
}
