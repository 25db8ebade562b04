use log::{debug, info};
use rand::Rng;
use shared::{MeshHandle, Player, PlayerId, SPAWN_HALF_EXTENT};
use std::collections::HashMap;

/// Authoritative player state, keyed by the owning connection's ID.
///
/// Callers pass the ID bound to the connection a request arrived on, never an
/// ID taken from a payload, so a connection can only touch its own entry.
#[derive(Debug, Clone, Default)]
pub struct PlayerRegistry {
    players: HashMap<PlayerId, Player>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the player for a freshly admitted connection at a random spawn point.
    pub fn spawn<R: Rng>(&mut self, id: PlayerId, rng: &mut R) -> &Player {
        let x = rng.gen_range(-SPAWN_HALF_EXTENT..SPAWN_HALF_EXTENT);
        let z = rng.gen_range(-SPAWN_HALF_EXTENT..SPAWN_HALF_EXTENT);

        info!("Spawned player {} at ({:.1}, {:.1})", id, x, z);
        self.players.entry(id).or_insert(Player::new(id, x, z))
    }

    /// Overwrites the player's position. Coordinates are accepted as given.
    pub fn update_position(&mut self, id: PlayerId, x: f32, z: f32) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                player.x = x;
                player.z = z;
                true
            }
            None => false,
        }
    }

    /// Adds `delta` to the player's size and returns the new size.
    ///
    /// Negative, zero and non-finite deltas are ignored so size never shrinks.
    pub fn grow(&mut self, id: PlayerId, delta: f32) -> Option<f32> {
        if !delta.is_finite() || delta <= 0.0 {
            debug!("Ignoring growth of {} for player {}", delta, id);
            return None;
        }

        let player = self.players.get_mut(&id)?;
        player.size += delta;
        debug!("Player {} grew to size {:.2}", id, player.size);
        Some(player.size)
    }

    pub fn register_mesh(&mut self, id: PlayerId, mesh: MeshHandle) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                info!(
                    "Registered mesh {} ({}) for player {}",
                    mesh.mesh_id, mesh.mesh_uuid, id
                );
                player.mesh = Some(mesh);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        let player = self.players.remove(&id)?;
        info!("Removed player {} at size {:.2}", id, player.size);
        Some(player)
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Every player, ordered by ID
    pub fn snapshot(&self) -> Vec<Player> {
        let mut players: Vec<Player> = self.players.values().cloned().collect();
        players.sort_by_key(|player| player.id);
        players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::{GROWTH_INCREMENT, INITIAL_SIZE};

    fn registry_with(ids: &[PlayerId]) -> PlayerRegistry {
        let mut rng = StdRng::seed_from_u64(7);
        let mut registry = PlayerRegistry::new();
        for id in ids {
            registry.spawn(*id, &mut rng);
        }
        registry
    }

    #[test]
    fn test_spawn_within_bounds_with_default_size() {
        let registry = registry_with(&[1, 2, 3, 4, 5]);
        for player in registry.snapshot() {
            assert!(player.x >= -SPAWN_HALF_EXTENT && player.x < SPAWN_HALF_EXTENT);
            assert!(player.z >= -SPAWN_HALF_EXTENT && player.z < SPAWN_HALF_EXTENT);
            assert_eq!(player.size, INITIAL_SIZE);
        }
    }

    #[test]
    fn test_update_position_overwrites() {
        let mut registry = registry_with(&[1]);
        assert!(registry.update_position(1, 250.0, -3.5));
        let player = registry.get(1).unwrap();
        assert_eq!((player.x, player.z), (250.0, -3.5));
    }

    #[test]
    fn test_update_position_unknown_player() {
        let mut registry = registry_with(&[1]);
        assert!(!registry.update_position(2, 0.0, 0.0));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_grow_accumulates() {
        let mut registry = registry_with(&[1]);
        let size = registry.grow(1, GROWTH_INCREMENT).unwrap();
        assert_approx_eq!(size, 1.1, 1e-6);
        let size = registry.grow(1, GROWTH_INCREMENT).unwrap();
        assert_approx_eq!(size, 1.2, 1e-6);
    }

    #[test]
    fn test_grow_rejects_shrinking() {
        let mut registry = registry_with(&[1]);
        assert!(registry.grow(1, -0.5).is_none());
        assert!(registry.grow(1, 0.0).is_none());
        assert!(registry.grow(1, f32::NAN).is_none());
        assert_eq!(registry.get(1).unwrap().size, INITIAL_SIZE);
    }

    #[test]
    fn test_register_mesh() {
        let mut registry = registry_with(&[1]);
        let mesh = MeshHandle {
            mesh_id: 42,
            mesh_uuid: "2b1f".to_string(),
        };
        assert!(registry.register_mesh(1, mesh.clone()));
        assert_eq!(registry.get(1).unwrap().mesh, Some(mesh.clone()));
        assert!(!registry.register_mesh(9, mesh));
    }

    #[test]
    fn test_remove_then_respawn_starts_fresh() {
        let mut registry = registry_with(&[1]);
        registry.grow(1, 2.0);
        assert!(registry.remove(1).is_some());
        assert!(registry.remove(1).is_none());
        assert!(registry.is_empty());

        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(registry.spawn(2, &mut rng).size, INITIAL_SIZE);
    }

    #[test]
    fn test_snapshot_sorted_by_id() {
        let registry = registry_with(&[9, 3, 5]);
        let ids: Vec<PlayerId> = registry.snapshot().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 5, 9]);
    }
}
