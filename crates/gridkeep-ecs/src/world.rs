//! Entity and world state (C3): the single authoritative mutable store.
//!
//! Every accessor here runs only on the tick-loop thread. No worker thread
//! ever holds a reference to a [`World`] -- workers see an immutable
//! [`Snapshot`](crate::snapshot::Snapshot) instead. That split is the whole
//! reason this module can stay lock-free: there is exactly one writer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntityIdAllocator};
use crate::events::{Event, EventKind, EventRingBuffer};
use crate::position::Position;
use crate::spatial::SpatialIndex;
use crate::status::StatusEffect;
use crate::tile::{Grid, Tile};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub atk: f64,
    pub def: f64,
    pub spd: f64,
    pub crit: f64,
    pub evasion: f64,
    pub matk: f64,
    pub mdef: f64,
}

impl Default for Stats {
    fn default() -> Self {
        Self { atk: 10.0, def: 5.0, spd: 1.0, crit: 0.05, evasion: 0.05, matk: 10.0, mdef: 5.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeKind {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
    Luck,
    Perception,
    Willpower,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 9] = [
        AttributeKind::Strength,
        AttributeKind::Dexterity,
        AttributeKind::Constitution,
        AttributeKind::Intelligence,
        AttributeKind::Wisdom,
        AttributeKind::Charisma,
        AttributeKind::Luck,
        AttributeKind::Perception,
        AttributeKind::Willpower,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub kind: AttributeKind,
    pub value: i32,
    /// Fractional progress toward the next point, in `[0, 1)`.
    pub training_progress: f64,
    pub cap: i32,
}

impl Attribute {
    pub fn new(kind: AttributeKind, cap: i32) -> Self {
        Self { kind, value: 0, training_progress: 0.0, cap }
    }

    /// Add fractional training progress, rolling over into attribute points
    /// (clamped at `cap`). Returns the number of points gained.
    pub fn train(&mut self, amount: f64) -> i32 {
        if self.value >= self.cap {
            return 0;
        }
        self.training_progress += amount;
        let mut gained = 0;
        while self.training_progress >= 1.0 && self.value < self.cap {
            self.training_progress -= 1.0;
            self.value += 1;
            gained += 1;
        }
        if self.value >= self.cap {
            self.training_progress = 0.0;
        }
        gained
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillState {
    pub skill_id: String,
    pub cooldown_remaining: u32,
    pub times_used: u32,
    pub mastery_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestState {
    pub quest_id: String,
    pub progress: u32,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiState {
    Idle,
    Hunting,
    Fleeing,
    Resting,
    Working,
    Dead,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMemory {
    pub id: EntityId,
    pub kind: String,
    pub last_known_stats: Stats,
    pub last_seen_tick: u64,
    pub currently_visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPath {
    pub steps: Vec<Position>,
    pub target: Position,
}

/// The central subject of the simulation. Field groups mirror the four
/// concerns every system touches: where it is, how healthy it is, what it
/// can do, and what it currently believes about the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    // -- Identity & placement --
    pub id: EntityId,
    pub kind: String,
    pub position: Position,
    pub home_position: Position,
    pub faction: String,

    // -- Vitals --
    pub hp: i64,
    pub max_hp: i64,
    pub stamina: i64,
    pub max_stamina: i64,
    pub experience: u64,
    pub level: u32,
    pub gold: u64,
    pub base_stats: Stats,
    pub attributes: [Attribute; 9],

    // -- Capabilities --
    pub equipped_weapon: Option<u64>,
    pub equipped_armor: Option<u64>,
    pub equipped_accessory: Option<u64>,
    pub inventory: Vec<u64>,
    pub bag_capacity: usize,
    pub known_skills: Vec<SkillState>,
    pub known_recipes: Vec<String>,
    pub quests: Vec<QuestState>,

    // -- Cognition --
    pub ai_state: AiState,
    pub vision_range: i32,
    pub terrain_memory: HashMap<Position, u64>,
    pub entity_memory: Vec<EntityMemory>,
    pub status_effects: Vec<StatusEffect>,
    pub craft_target: Option<String>,
    pub cached_path: Option<CachedPath>,

    /// Tick at which this entity next becomes eligible to act. Advanced by
    /// action handlers according to action-kind and terrain cost.
    pub next_act_at: u64,
    /// Progress counter for the currently in-flight channelled action
    /// (loot/harvest/craft/trade), if any.
    pub action_progress: u32,
}

impl Entity {
    pub fn new(id: EntityId, kind: impl Into<String>, position: Position, faction: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            position,
            home_position: position,
            faction: faction.into(),
            hp: 100,
            max_hp: 100,
            stamina: 100,
            max_stamina: 100,
            experience: 0,
            level: 1,
            gold: 0,
            base_stats: Stats::default(),
            attributes: AttributeKind::ALL.map(|k| Attribute::new(k, 20)),
            equipped_weapon: None,
            equipped_armor: None,
            equipped_accessory: None,
            inventory: Vec::new(),
            bag_capacity: 20,
            known_skills: Vec::new(),
            known_recipes: Vec::new(),
            quests: Vec::new(),
            ai_state: AiState::Idle,
            vision_range: 8,
            terrain_memory: HashMap::new(),
            entity_memory: Vec::new(),
            status_effects: Vec::new(),
            craft_target: None,
            cached_path: None,
            next_act_at: 0,
            action_progress: 0,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }

    pub fn is_eligible_to_act(&self, tick: u64) -> bool {
        !self.is_dead() && self.next_act_at <= tick
    }

    pub fn inventory_has_room(&self) -> bool {
        self.inventory.len() < self.bag_capacity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundItemPile {
    pub position: Position,
    pub items: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: u64,
    pub kind: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: u64,
    pub kind: String,
    pub position: Position,
    pub remaining_yield: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: u64,
    pub name: String,
    pub min: Position,
    pub max: Position,
}

/// The single authoritative mutable store: grid, entities, spatial index,
/// ground item piles, buildings, resource nodes and the event log. Owned
/// exclusively by the tick loop thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub tick: u64,
    pub world_seed: u64,
    pub grid: Grid,
    entities: HashMap<EntityId, Entity>,
    allocator: EntityIdAllocator,
    spatial: SpatialIndex,
    pub ground_items: Vec<GroundItemPile>,
    pub buildings: Vec<Building>,
    pub resource_nodes: Vec<ResourceNode>,
    pub regions: Vec<Region>,
    pub events: EventRingBuffer,
}

impl World {
    pub fn new(world_seed: u64, grid: Grid, event_buffer_capacity: usize) -> Self {
        Self {
            tick: 0,
            world_seed,
            grid,
            entities: HashMap::new(),
            allocator: EntityIdAllocator::new(),
            spatial: SpatialIndex::new(),
            ground_items: Vec::new(),
            buildings: Vec::new(),
            resource_nodes: Vec::new(),
            regions: Vec::new(),
            events: EventRingBuffer::new(event_buffer_capacity),
        }
    }

    pub fn allocate_id(&mut self) -> EntityId {
        self.allocator.allocate()
    }

    /// Insert a fully constructed entity into the world, indexing its
    /// position. Panics if `entity.id` already exists -- ids are allocated
    /// exclusively through `allocate_id` and must be unique by construction.
    pub fn add_entity(&mut self, entity: Entity) {
        let id = entity.id;
        let pos = entity.position;
        assert!(!self.entities.contains_key(&id), "duplicate entity id {id}");
        self.spatial.insert(id.0, pos);
        self.entities.insert(id, entity);
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        self.spatial.remove(id.0, entity.position);
        Some(entity)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entities_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// Move `id` to `new_pos`, updating both the entity record and the
    /// spatial index. Returns `false` (no-op) if `id` is unknown.
    pub fn move_entity(&mut self, id: EntityId, new_pos: Position) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else { return false };
        let old_pos = entity.position;
        entity.position = new_pos;
        self.spatial.move_entity(id.0, old_pos, new_pos);
        true
    }

    /// Apply a signed HP delta, clamped to `[0, max_hp]`. Returns the
    /// entity's hp after the change, or `None` if `id` is unknown.
    pub fn apply_damage(&mut self, id: EntityId, delta: i64) -> Option<i64> {
        let entity = self.entities.get_mut(&id)?;
        entity.hp = (entity.hp + delta).clamp(0, entity.max_hp);
        Some(entity.hp)
    }

    /// Drop `items` from `id` (or from thin air if `id` is `None`, e.g. an
    /// already-removed corpse) onto a ground pile at `pos`, merging with an
    /// existing pile if one is present.
    pub fn drop_items(&mut self, pos: Position, items: Vec<u64>) {
        if items.is_empty() {
            return;
        }
        if let Some(pile) = self.ground_items.iter_mut().find(|p| p.position == pos) {
            pile.items.extend(items);
        } else {
            self.ground_items.push(GroundItemPile { position: pos, items });
        }
    }

    /// Transfer up to `entity`'s remaining bag capacity from the pile at
    /// `pos` into its inventory. Returns the items actually picked up.
    pub fn pick_up_items(&mut self, id: EntityId, pos: Position) -> Vec<u64> {
        let Some(pile_idx) = self.ground_items.iter().position(|p| p.position == pos) else {
            return Vec::new();
        };
        let Some(entity) = self.entities.get_mut(&id) else { return Vec::new() };
        let room = entity.bag_capacity.saturating_sub(entity.inventory.len());
        if room == 0 {
            return Vec::new();
        }
        let pile = &mut self.ground_items[pile_idx];
        let take = room.min(pile.items.len());
        let taken: Vec<u64> = pile.items.drain(0..take).collect();
        entity.inventory.extend(taken.iter().copied());
        if pile.items.is_empty() {
            self.ground_items.remove(pile_idx);
        }
        taken
    }

    pub fn attach_effect(&mut self, id: EntityId, effect: StatusEffect) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else { return false };
        entity.status_effects.push(effect);
        true
    }

    /// Apply one tick of every active status effect on `id`: hp delta,
    /// then decrement remaining ticks, then drop expired effects. Called
    /// once per tick per entity during Cleanup.
    pub fn advance_effects(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get_mut(&id) else { return };
        let max_hp = entity.max_hp;
        let mut expired = Vec::new();
        for effect in &mut entity.status_effects {
            entity.hp = (entity.hp + effect.hp_delta_per_tick).clamp(0, max_hp);
            effect.tick();
            if effect.is_expired() {
                expired.push(effect.kind);
            }
        }
        entity.status_effects.retain(|e| !e.is_expired());
        for kind in expired {
            self.record_event(id, EventKind::StatusExpired { kind });
        }
    }

    pub fn record_event(&mut self, actor: EntityId, kind: EventKind) {
        self.events.push(Event { tick: self.tick, actor: actor.0, kind });
    }

    pub fn tile_at(&self, pos: Position) -> Option<Tile> {
        self.grid.tile_at(pos)
    }

    pub fn set_tile(&mut self, pos: Position, tile: Tile) -> bool {
        self.grid.set_tile(pos, tile)
    }

    /// Defensive rebuild of the spatial index from authoritative entity
    /// positions. Only ever needed if a bug desynchronizes the index from
    /// `self.entities`; called once at tick start as a cheap sampled check
    /// (see `spatial_index_is_consistent`) and, if that fails, in full.
    pub fn rebuild_spatial_index(&mut self) {
        tracing::warn!(tick = self.tick, "rebuilding spatial index after consistency check failure");
        self.spatial.clear();
        for entity in self.entities.values() {
            if !entity.is_dead() {
                self.spatial.insert(entity.id.0, entity.position);
            }
        }
    }

    /// Sampled consistency check: full scan below 256 entities, a fixed
    /// sample of 64 above. A mismatch triggers `rebuild_spatial_index` but
    /// is never itself a fatal condition -- the rebuild is the recovery.
    pub fn spatial_index_is_consistent(&self) -> bool {
        let sample: Box<dyn Iterator<Item = &Entity>> = if self.entities.len() <= 256 {
            Box::new(self.entities.values())
        } else {
            Box::new(self.entities.values().take(64))
        };
        sample
            .filter(|e| !e.is_dead())
            .all(|e| self.spatial.at(e.position).contains(&e.id.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_world() -> World {
        World::new(1, Grid::filled(8, 8, crate::tile::TileKind::Floor), 1024)
    }

    fn spawn(world: &mut World, pos: Position) -> EntityId {
        let id = world.allocate_id();
        world.add_entity(Entity::new(id, "goblin", pos, "wild"));
        id
    }

    #[test]
    fn add_and_remove_entity_updates_spatial_index() {
        let mut world = sample_world();
        let id = spawn(&mut world, Position::new(1, 1));
        assert_eq!(world.spatial().at(Position::new(1, 1)), &[id.0]);
        world.remove_entity(id);
        assert!(world.spatial().at(Position::new(1, 1)).is_empty());
    }

    #[test]
    fn move_entity_updates_position_and_index() {
        let mut world = sample_world();
        let id = spawn(&mut world, Position::new(1, 1));
        world.move_entity(id, Position::new(2, 1));
        assert_eq!(world.entity(id).unwrap().position, Position::new(2, 1));
        assert_eq!(world.spatial().at(Position::new(2, 1)), &[id.0]);
        assert!(world.spatial().at(Position::new(1, 1)).is_empty());
    }

    #[test]
    fn apply_damage_clamps_to_bounds() {
        let mut world = sample_world();
        let id = spawn(&mut world, Position::new(0, 0));
        assert_eq!(world.apply_damage(id, -10_000), Some(0));
        assert_eq!(world.apply_damage(id, 10_000), Some(world.entity(id).unwrap().max_hp));
    }

    #[test]
    fn drop_and_pick_up_round_trip() {
        let mut world = sample_world();
        let id = spawn(&mut world, Position::new(3, 3));
        world.drop_items(Position::new(3, 3), vec![10, 11]);
        let taken = world.pick_up_items(id, Position::new(3, 3));
        assert_eq!(taken, vec![10, 11]);
        assert_eq!(world.entity(id).unwrap().inventory, vec![10, 11]);
        assert!(world.ground_items.is_empty());
    }

    #[test]
    fn pick_up_respects_bag_capacity() {
        let mut world = sample_world();
        let id = spawn(&mut world, Position::new(0, 0));
        world.entity_mut(id).unwrap().bag_capacity = 1;
        world.drop_items(Position::new(0, 0), vec![1, 2, 3]);
        let taken = world.pick_up_items(id, Position::new(0, 0));
        assert_eq!(taken, vec![1]);
        assert_eq!(world.ground_items[0].items, vec![2, 3]);
    }

    #[test]
    fn advance_effects_applies_damage_and_expires() {
        let mut world = sample_world();
        let id = spawn(&mut world, Position::new(0, 0));
        world.attach_effect(id, StatusEffect::poison(id.0, 5, 1));
        world.advance_effects(id);
        let entity = world.entity(id).unwrap();
        assert_eq!(entity.hp, entity.max_hp - 5);
        assert!(entity.status_effects.is_empty());
    }

    #[test]
    fn spatial_index_consistency_check_passes_for_well_formed_world() {
        let mut world = sample_world();
        spawn(&mut world, Position::new(0, 0));
        spawn(&mut world, Position::new(1, 0));
        assert!(world.spatial_index_is_consistent());
    }

    #[test]
    fn duplicate_entity_id_panics() {
        let mut world = sample_world();
        let id = world.allocate_id();
        world.add_entity(Entity::new(id, "a", Position::new(0, 0), "f"));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            world.add_entity(Entity::new(id, "b", Position::new(1, 0), "f"));
        }));
        assert!(result.is_err());
    }

    #[test]
    fn attribute_training_rolls_over_into_points() {
        let mut attr = Attribute::new(AttributeKind::Strength, 5);
        assert_eq!(attr.train(0.6), 0);
        assert_eq!(attr.train(0.6), 1);
        assert_eq!(attr.value, 1);
    }

    #[test]
    fn attribute_training_stops_at_cap() {
        let mut attr = Attribute::new(AttributeKind::Strength, 1);
        attr.train(1.5);
        assert_eq!(attr.value, 1);
        assert_eq!(attr.train(5.0), 0);
    }
}
