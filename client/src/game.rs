use log::debug;
use shared::{ObjectId, Player, PlayerId, ServerMessage, WorldObject};

/// Extra distance beyond the player's size at which a collectible counts as touched
pub const CONSUME_REACH: f32 = 1.0;

/// The client's copy of the latest server snapshots
#[derive(Debug, Clone, Default)]
pub struct ArenaView {
    pub player_id: Option<PlayerId>,
    players: Vec<Player>,
    collectibles: Vec<WorldObject>,
    hazards: Vec<WorldObject>,
    players_revision: Option<u64>,
    objects_revision: Option<u64>,
}

impl ArenaView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a snapshot or welcome. Returns false for messages it ignored.
    ///
    /// A snapshot older than the last one of the same kind is dropped.
    pub fn apply(&mut self, message: &ServerMessage) -> bool {
        match message {
            ServerMessage::Welcome { player_id, .. } => {
                self.player_id = Some(*player_id);
                true
            }
            ServerMessage::PlayersSnapshot { revision, players } => {
                if self.players_revision.is_some_and(|last| *revision < last) {
                    debug!("Dropping stale players snapshot {}", revision);
                    return false;
                }
                self.players_revision = Some(*revision);
                self.players = players.clone();
                true
            }
            ServerMessage::ObjectsSnapshot {
                revision,
                collectibles,
                hazards,
            } => {
                if self.objects_revision.is_some_and(|last| *revision < last) {
                    debug!("Dropping stale objects snapshot {}", revision);
                    return false;
                }
                self.objects_revision = Some(*revision);
                self.collectibles = collectibles.clone();
                self.hazards = hazards.clone();
                true
            }
            ServerMessage::AdmissionRejected { .. } | ServerMessage::ProbeAck { .. } => false,
        }
    }

    pub fn me(&self) -> Option<&Player> {
        let id = self.player_id?;
        self.player(id)
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn collectibles(&self) -> &[WorldObject] {
        &self.collectibles
    }

    pub fn hazards(&self) -> &[WorldObject] {
        &self.hazards
    }

    pub fn has_collectible(&self, id: ObjectId) -> bool {
        self.collectibles.iter().any(|object| object.id == id)
    }

    pub fn nearest_collectible(&self, x: f32, z: f32) -> Option<&WorldObject> {
        self.collectibles.iter().min_by(|a, b| {
            let da = (a.x - x).powi(2) + (a.z - z).powi(2);
            let db = (b.x - x).powi(2) + (b.z - z).powi(2);
            da.total_cmp(&db)
        })
    }

    /// The nearest collectible a player of `size` standing at (x, z) is touching
    pub fn touching_collectible(&self, x: f32, z: f32, size: f32) -> Option<&WorldObject> {
        self.nearest_collectible(x, z).filter(|object| {
            let distance = ((object.x - x).powi(2) + (object.z - z).powi(2)).sqrt();
            distance <= size + CONSUME_REACH
        })
    }
}
