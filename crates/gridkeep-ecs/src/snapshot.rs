//! Immutable, deeply cloned read-view of world state at a tick boundary.
//!
//! A snapshot is produced once per tick (`Snapshot::from_world`) and handed
//! to readers -- AI workers, replay recorders, eventually an API layer --
//! who hold it for as long as they like. Nothing about a snapshot changes
//! after construction; there is no shared mutable state between a snapshot
//! and the live world that produced it, which is what lets readers and the
//! tick-loop writer proceed without any synchronization beyond the atomic
//! pointer swap that publishes it (see `gridkeep_engine::manager`).

use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::position::Position;
use crate::tile::{Grid, Tile};
use crate::world::{Building, Entity, GroundItemPile, Region, ResourceNode, World};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub world_seed: u64,
    pub entities: Vec<Entity>,
    pub grid: Grid,
    pub ground_items: Vec<GroundItemPile>,
    pub buildings: Vec<Building>,
    pub resource_nodes: Vec<ResourceNode>,
    pub regions: Vec<Region>,
    pub events: Vec<Event>,
}

impl Snapshot {
    /// Deep-clone every piece of `world` into an independent, immutable
    /// value. Entities are cloned in id order so that two snapshots of
    /// equivalent state serialize identically regardless of the live
    /// world's internal hash-map iteration order.
    pub fn from_world(world: &World) -> Self {
        let mut entities: Vec<Entity> = world.entities().cloned().collect();
        entities.sort_by_key(|e| e.id);

        Self {
            tick: world.tick,
            world_seed: world.world_seed,
            entities,
            grid: world.grid.clone(),
            ground_items: world.ground_items.clone(),
            buildings: world.buildings.clone(),
            resource_nodes: world.resource_nodes.clone(),
            regions: world.regions.clone(),
            events: world.events.iter().cloned().collect(),
        }
    }

    pub fn entity(&self, id: u64) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id.0 == id)
    }

    pub fn tile_at(&self, pos: Position) -> Option<Tile> {
        self.grid.tile_at(pos)
    }

    /// Events recorded at or after `since_tick`. `Snapshot.events` already
    /// holds only what was in the ring buffer at capture time, so this is a
    /// filter, not a separate store.
    pub fn events_since(&self, since_tick: u64) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.tick >= since_tick)
    }

    /// Canonical hash over (tick, sorted entity tuples, every tile in the
    /// grid, sorted ground items), used to compare two runs for bit-for-bit
    /// determinism. Entities are already stored in id order by
    /// `from_world`; ground items and the full tile list are sorted here so
    /// the fingerprint never depends on incidental storage order.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.tick.to_le_bytes());

        for entity in &self.entities {
            hasher.update(&entity.id.0.to_le_bytes());
            hasher.update(&entity.position.x.to_le_bytes());
            hasher.update(&entity.position.y.to_le_bytes());
            hasher.update(&entity.hp.to_le_bytes());
            hasher.update(&entity.next_act_at.to_le_bytes());
            hasher.update(entity.kind.as_bytes());
        }

        let mut tiles: Vec<(Position, Tile)> = self.grid.iter().collect();
        tiles.sort_by_key(|(pos, _)| (pos.x, pos.y));
        for (pos, tile) in tiles {
            hasher.update(&pos.x.to_le_bytes());
            hasher.update(&pos.y.to_le_bytes());
            hasher.update(&[u8_discriminant(tile)]);
        }

        let mut piles: Vec<&GroundItemPile> = self.ground_items.iter().collect();
        piles.sort_by_key(|p| (p.position.x, p.position.y));
        for pile in piles {
            hasher.update(&pile.position.x.to_le_bytes());
            hasher.update(&pile.position.y.to_le_bytes());
            for item in &pile.items {
                hasher.update(&item.to_le_bytes());
            }
        }

        *hasher.finalize().as_bytes()
    }
}

/// `TileKind` carries no explicit discriminant and isn't `Copy`-castable to
/// `u8` directly through `as`, so the fingerprint hashes its derived
/// ordinal via this helper instead of matching on every variant inline.
fn u8_discriminant(tile: Tile) -> u8 {
    tile.kind as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;
    use crate::tile::TileKind;
    use crate::world::Entity as WorldEntity;

    fn sample_world() -> World {
        let mut world = World::new(1, Grid::filled(4, 4, TileKind::Floor), 64);
        let id = world.allocate_id();
        world.add_entity(WorldEntity::new(id, "hero", Position::new(0, 0), "players"));
        world
    }

    #[test]
    fn snapshot_entities_are_sorted_by_id() {
        let mut world = sample_world();
        let id2 = world.allocate_id();
        world.add_entity(WorldEntity::new(id2, "goblin", Position::new(1, 1), "wild"));
        let snapshot = Snapshot::from_world(&world);
        let ids: Vec<u64> = snapshot.entities.iter().map(|e| e.id.0).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn fingerprint_is_deterministic_for_equal_state() {
        let world = sample_world();
        let a = Snapshot::from_world(&world).fingerprint();
        let b = Snapshot::from_world(&world).fingerprint();
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_changes_with_entity_position() {
        let mut world = sample_world();
        let before = Snapshot::from_world(&world).fingerprint();
        world.move_entity(EntityId(1), Position::new(2, 2));
        let after = Snapshot::from_world(&world).fingerprint();
        assert_ne!(before, after);
    }

    #[test]
    fn events_since_filters_by_tick() {
        let mut world = sample_world();
        world.tick = 5;
        world.record_event(EntityId(1), crate::events::EventKind::Spawned);
        world.tick = 10;
        world.record_event(EntityId(1), crate::events::EventKind::Spawned);
        let snapshot = Snapshot::from_world(&world);
        assert_eq!(snapshot.events_since(8).count(), 1);
        assert_eq!(snapshot.events_since(0).count(), 2);
    }

    #[test]
    fn snapshot_is_independent_of_later_world_mutation() {
        let mut world = sample_world();
        let snapshot = Snapshot::from_world(&world);
        world.move_entity(EntityId(1), Position::new(3, 3));
        assert_eq!(snapshot.entity(1).unwrap().position, Position::new(0, 0));
    }
}
