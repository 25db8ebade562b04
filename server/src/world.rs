//! World object pool: collectibles and hazards with stable identities.
//!
//! Objects are keyed by an [`ObjectId`] handed out once at generation time and
//! never reused, so a consumption request always names exactly one instance no
//! matter how the pool has changed since the client last looked at it.

use log::{debug, info};
use rand::Rng;
use shared::{ObjectId, ObjectKind, WorldObject, ARENA_HALF_EXTENT, SPAWN_HALF_EXTENT};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct ObjectPool {
    collectibles: BTreeMap<ObjectId, WorldObject>,
    hazards: Vec<WorldObject>,
    next_id: ObjectId,
    consumed: u64,
}

impl ObjectPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a pool with `collectibles` and `hazards` at random positions.
    pub fn generate<R: Rng>(collectibles: usize, hazards: usize, rng: &mut R) -> Self {
        let mut pool = Self::new();
        pool.scatter_collectibles(collectibles, rng);
        for _ in 0..hazards {
            let x = rng.gen_range(-SPAWN_HALF_EXTENT..SPAWN_HALF_EXTENT);
            let z = rng.gen_range(-SPAWN_HALF_EXTENT..SPAWN_HALF_EXTENT);
            let id = pool.allocate_id();
            pool.hazards.push(WorldObject::new(id, ObjectKind::Hazard, x, z));
        }
        info!(
            "Generated {} collectibles and {} hazards",
            pool.collectibles.len(),
            pool.hazards.len()
        );
        pool
    }

    /// Adds `count` collectibles with fresh identities. Hazards are untouched.
    pub fn scatter_collectibles<R: Rng>(&mut self, count: usize, rng: &mut R) {
        for _ in 0..count {
            let x = rng.gen_range(-ARENA_HALF_EXTENT..ARENA_HALF_EXTENT);
            let z = rng.gen_range(-ARENA_HALF_EXTENT..ARENA_HALF_EXTENT);
            let id = self.allocate_id();
            self.collectibles
                .insert(id, WorldObject::new(id, ObjectKind::Collectible, x, z));
        }
    }

    fn allocate_id(&mut self) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Removes the collectible `id` and hands it back.
    ///
    /// Returns `Some` exactly once per collectible; every later call for the
    /// same ID, and any call naming a hazard or an unknown ID, returns `None`.
    pub fn try_consume(&mut self, id: ObjectId) -> Option<WorldObject> {
        match self.collectibles.remove(&id) {
            Some(object) => {
                self.consumed += 1;
                Some(object)
            }
            None => {
                debug!("Ignoring consume of unknown or consumed object {}", id);
                None
            }
        }
    }

    pub fn collectible(&self, id: ObjectId) -> Option<&WorldObject> {
        self.collectibles.get(&id)
    }

    pub fn collectibles(&self) -> Vec<WorldObject> {
        self.collectibles.values().cloned().collect()
    }

    pub fn hazards(&self) -> Vec<WorldObject> {
        self.hazards.clone()
    }

    pub fn collectible_count(&self) -> usize {
        self.collectibles.len()
    }

    pub fn hazard_count(&self) -> usize {
        self.hazards.len()
    }

    /// Total collectibles consumed over the pool's lifetime
    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}
