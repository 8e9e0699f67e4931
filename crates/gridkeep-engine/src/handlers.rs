//! Action handlers (C8): each action kind is a (validate, apply) pair.
//! `validate` is called by the resolver against a snapshot-plus-tentative
//! view; `apply` is called by the tick loop, in resolved order, and is the
//! only code permitted to mutate world state.

use std::collections::HashMap;

use gridkeep_ecs::rng::{self, Domain};
use gridkeep_ecs::snapshot::Snapshot;
use gridkeep_ecs::status::StatusEffect;
use gridkeep_ecs::world::World;
use gridkeep_ecs::{entity::EntityId, events::EventKind};

use crate::proposal::{ActionKind, Proposal};

/// Fixed damage multiplier applied to a critical hit.
const CRIT_MULTIPLIER: f64 = 1.5;
const COMBAT_VARIANCE_LO: f64 = 0.85;
const COMBAT_VARIANCE_HI: f64 = 1.15;
const DEFAULT_WEAPON_RANGE: i64 = 1;
const REST_HP_PER_TICK: i64 = 5;
const REST_STAMINA_PER_TICK: i64 = 10;
const LOOT_DURATION_TICKS: u32 = 3;

pub trait ActionHandler: Send + Sync {
    /// Pure predicate: does this proposal still make sense against
    /// `snapshot`? Called by the resolver; must not mutate anything.
    fn validate(&self, snapshot: &Snapshot, proposal: &Proposal) -> bool;

    /// Mutate `world` to realize an accepted proposal. Only ever called
    /// after `validate` passed against the resolver's tentative view.
    fn apply(&self, world: &mut World, proposal: &Proposal);
}

pub struct MoveHandler;

impl ActionHandler for MoveHandler {
    fn validate(&self, snapshot: &Snapshot, proposal: &Proposal) -> bool {
        let Some(actor) = snapshot.entity(proposal.actor_id) else { return false };
        let Some(target) = proposal.target_position else { return false };
        actor.position.is_adjacent(target) && snapshot.tile_at(target).is_some_and(|t| t.is_walkable())
    }

    fn apply(&self, world: &mut World, proposal: &Proposal) {
        let Some(target) = proposal.target_position else { return };
        let actor_id = EntityId(proposal.actor_id);
        let Some(actor) = world.entity(actor_id) else { return };
        let from = actor.position;
        let spd = actor.base_stats.spd.max(0.01);
        let cost = world.tile_at(target).map(|t| t.movement_cost()).unwrap_or(1.0);

        world.move_entity(actor_id, target);
        if let Some(actor) = world.entity_mut(actor_id) {
            let advance = (cost / spd).max(1.0).round() as u64;
            actor.next_act_at = proposal.next_act_at + advance;
        }
        world.record_event(
            actor_id,
            EventKind::Moved { from_x: from.x, from_y: from.y, to_x: target.x, to_y: target.y },
        );
    }
}

pub struct CombatHandler;

impl CombatHandler {
    fn in_range(snapshot: &Snapshot, attacker_pos: gridkeep_ecs::position::Position, defender_pos: gridkeep_ecs::position::Position) -> bool {
        // Line-of-sight beyond melee range is out of scope for the opaque
        // weapon-range content this core treats as a data table; every
        // weapon in the default tables is melee, so range is always 1.
        let _ = snapshot;
        attacker_pos.manhattan_distance(defender_pos) <= DEFAULT_WEAPON_RANGE
    }
}

impl ActionHandler for CombatHandler {
    fn validate(&self, snapshot: &Snapshot, proposal: &Proposal) -> bool {
        let Some(actor) = snapshot.entity(proposal.actor_id) else { return false };
        let Some(target_id) = proposal.target_id else { return false };
        let Some(target) = snapshot.entity(target_id) else { return false };
        !target.is_dead() && Self::in_range(snapshot, actor.position, target.position)
    }

    fn apply(&self, world: &mut World, proposal: &Proposal) {
        let Some(target_id) = proposal.target_id else { return };
        let actor_id = EntityId(proposal.actor_id);
        let defender_id = EntityId(target_id);
        let tick = world.tick;
        let seed = world.world_seed;

        let Some(attacker) = world.entity(actor_id) else { return };
        let Some(defender) = world.entity(defender_id) else { return };
        let atk = attacker.base_stats.atk;
        let def = defender.base_stats.def;
        let crit_rate = attacker.base_stats.crit;
        let evasion = defender.base_stats.evasion;

        let variance = COMBAT_VARIANCE_LO
            + rng::next_float(seed, Domain::Combat, actor_id.0, tick, 0) * (COMBAT_VARIANCE_HI - COMBAT_VARIANCE_LO);
        let crit = rng::next_float(seed, Domain::Combat, actor_id.0, tick, 1) < crit_rate;
        let evaded = rng::next_float(seed, Domain::Combat, defender_id.0, tick, 2) < evasion;

        let damage = if evaded {
            0
        } else {
            let raw = atk * variance * if crit { CRIT_MULTIPLIER } else { 1.0 };
            ((raw - def).max(1.0)) as i64
        };

        let hp_after = world.apply_damage(defender_id, -damage).unwrap_or(0);
        if evaded {
            world.record_event(actor_id, EventKind::AttackMissed { target: target_id });
        } else {
            world.record_event(actor_id, EventKind::AttackLanded { target: target_id, damage, crit });
        }

        if let Some(attacker) = world.entity_mut(actor_id) {
            attacker.next_act_at = proposal.next_act_at + 10;
        }

        if hp_after <= 0 {
            handle_death(world, defender_id, Some(actor_id.0));
        }
    }
}

pub struct RestHandler;

impl ActionHandler for RestHandler {
    fn validate(&self, snapshot: &Snapshot, proposal: &Proposal) -> bool {
        snapshot.entity(proposal.actor_id).is_some()
    }

    fn apply(&self, world: &mut World, proposal: &Proposal) {
        let actor_id = EntityId(proposal.actor_id);
        world.apply_damage(actor_id, REST_HP_PER_TICK);
        if let Some(actor) = world.entity_mut(actor_id) {
            actor.stamina = (actor.stamina + REST_STAMINA_PER_TICK).min(actor.max_stamina);
            actor.next_act_at = proposal.next_act_at + 5;
        }
        world.advance_effects(actor_id);
    }
}

/// Loot is channelled: each accepted LOOT proposal advances
/// `action_progress`; the transfer only happens once progress reaches
/// `LOOT_DURATION_TICKS`. The entity re-proposes LOOT on its own next tick
/// via `goals` as long as a pile remains in range and its bag has room.
pub struct LootHandler;

impl ActionHandler for LootHandler {
    fn validate(&self, snapshot: &Snapshot, proposal: &Proposal) -> bool {
        let Some(actor) = snapshot.entity(proposal.actor_id) else { return false };
        let Some(pos) = proposal.target_position else { return false };
        let adjacent_or_here = actor.position == pos || actor.position.is_adjacent(pos);
        adjacent_or_here && actor.inventory_has_room() && snapshot.ground_items.iter().any(|p| p.position == pos)
    }

    fn apply(&self, world: &mut World, proposal: &Proposal) {
        let Some(pos) = proposal.target_position else { return };
        let actor_id = EntityId(proposal.actor_id);
        let Some(actor) = world.entity_mut(actor_id) else { return };
        actor.action_progress += 1;
        let ready = actor.action_progress >= LOOT_DURATION_TICKS;
        if ready {
            actor.action_progress = 0;
            actor.next_act_at = proposal.next_act_at + 1;
            let taken = world.pick_up_items(actor_id, pos);
            if !taken.is_empty() {
                world.record_event(actor_id, EventKind::ItemPickedUp { item_count: taken.len() as u32 });
            }
        } else if let Some(actor) = world.entity_mut(actor_id) {
            actor.next_act_at = proposal.next_act_at + 1;
        }
    }
}

/// HARVEST, TRADE, USE_ITEM, CRAFT and LEARN_SKILL are all modeled the same
/// way the specification describes them: a validate/apply pair driven by a
/// progress counter, with no handler-specific state beyond a fixed
/// duration. A production content layer would give each its own payload
/// interpretation; this generic handler only needs to demonstrate the
/// channelled-action pattern itself.
pub struct ChannelledHandler {
    pub duration_ticks: u32,
}

impl ActionHandler for ChannelledHandler {
    fn validate(&self, snapshot: &Snapshot, proposal: &Proposal) -> bool {
        snapshot.entity(proposal.actor_id).is_some()
    }

    fn apply(&self, world: &mut World, proposal: &Proposal) {
        let actor_id = EntityId(proposal.actor_id);
        let Some(actor) = world.entity_mut(actor_id) else { return };
        actor.action_progress += 1;
        if actor.action_progress >= self.duration_ticks {
            actor.action_progress = 0;
        }
        actor.next_act_at = proposal.next_act_at + 1;
    }
}

/// Remove a dead entity after it drops its inventory, recording the death
/// event. Hero respawn is a cleanup-phase policy (`tick::run_cleanup`), not
/// part of this per-death bookkeeping.
pub fn handle_death(world: &mut World, id: EntityId, killer: Option<u64>) {
    let Some(entity) = world.entity(id) else { return };
    let pos = entity.position;
    let items = entity.inventory.clone();
    if !items.is_empty() {
        world.record_event(id, EventKind::ItemDropped { item_count: items.len() as u32 });
    }
    world.drop_items(pos, items);
    world.record_event(id, EventKind::Died { killer });
}

pub struct HandlerRegistry {
    handlers: HashMap<ActionKind, Box<dyn ActionHandler>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        let mut handlers: HashMap<ActionKind, Box<dyn ActionHandler>> = HashMap::new();
        handlers.insert(ActionKind::Move, Box::new(MoveHandler));
        handlers.insert(ActionKind::Combat, Box::new(CombatHandler));
        handlers.insert(ActionKind::Rest, Box::new(RestHandler));
        handlers.insert(ActionKind::Loot, Box::new(LootHandler));
        for kind in [ActionKind::Harvest, ActionKind::Trade, ActionKind::UseItem, ActionKind::Craft, ActionKind::LearnSkill] {
            handlers.insert(kind, Box::new(ChannelledHandler { duration_ticks: 3 }));
        }
        Self { handlers }
    }
}

impl HandlerRegistry {
    /// Register or replace the handler for `kind`. New action kinds plug in
    /// here without touching the tick loop.
    pub fn register(&mut self, kind: ActionKind, handler: Box<dyn ActionHandler>) {
        self.handlers.insert(kind, handler);
    }

    pub fn get(&self, kind: ActionKind) -> Option<&dyn ActionHandler> {
        self.handlers.get(&kind).map(|h| h.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridkeep_ecs::position::Position;
    use gridkeep_ecs::tile::{Grid, TileKind};
    use gridkeep_ecs::world::Entity;

    fn world_with_two(pos_a: Position, pos_b: Position) -> World {
        let mut world = World::new(7, Grid::filled(16, 16, TileKind::Floor), 64);
        let a = world.allocate_id();
        world.add_entity(Entity::new(a, "hero", pos_a, "players"));
        let b = world.allocate_id();
        world.add_entity(Entity::new(b, "goblin", pos_b, "wild"));
        world
    }

    #[test]
    fn move_apply_updates_position_and_advances_next_act_at() {
        let mut world = world_with_two(Position::new(0, 0), Position::new(5, 5));
        let proposal = Proposal::new(1, ActionKind::Move, 0).with_target_position(Position::new(1, 0));
        MoveHandler.apply(&mut world, &proposal);
        assert_eq!(world.entity(EntityId(1)).unwrap().position, Position::new(1, 0));
        assert!(world.entity(EntityId(1)).unwrap().next_act_at > 0);
    }

    #[test]
    fn combat_apply_deals_damage_and_records_event() {
        let mut world = world_with_two(Position::new(0, 0), Position::new(1, 0));
        let before_hp = world.entity(EntityId(2)).unwrap().hp;
        let proposal = Proposal::new(1, ActionKind::Combat, 0).with_target_id(2);
        CombatHandler.apply(&mut world, &proposal);
        let after_hp = world.entity(EntityId(2)).unwrap().hp;
        assert!(after_hp <= before_hp);
    }

    #[test]
    fn rest_apply_restores_hp_and_stamina() {
        let mut world = world_with_two(Position::new(0, 0), Position::new(5, 5));
        world.apply_damage(EntityId(1), -50);
        let before = world.entity(EntityId(1)).unwrap().hp;
        let proposal = Proposal::new(1, ActionKind::Rest, 0);
        RestHandler.apply(&mut world, &proposal);
        assert!(world.entity(EntityId(1)).unwrap().hp > before);
    }

    #[test]
    fn loot_validate_rejects_full_bag() {
        let mut world = world_with_two(Position::new(0, 0), Position::new(5, 5));
        world.entity_mut(EntityId(1)).unwrap().bag_capacity = 0;
        world.drop_items(Position::new(0, 0), vec![1]);
        let snapshot = Snapshot::from_world(&world);
        let proposal = Proposal::new(1, ActionKind::Loot, 0).with_target_position(Position::new(0, 0));
        assert!(!LootHandler.validate(&snapshot, &proposal));
    }

    #[test]
    fn loot_apply_transfers_after_duration_elapses() {
        let mut world = world_with_two(Position::new(0, 0), Position::new(5, 5));
        world.drop_items(Position::new(0, 0), vec![42]);
        let proposal = Proposal::new(1, ActionKind::Loot, 0).with_target_position(Position::new(0, 0));
        for _ in 0..LOOT_DURATION_TICKS {
            LootHandler.apply(&mut world, &proposal);
        }
        assert_eq!(world.entity(EntityId(1)).unwrap().inventory, vec![42]);
    }

    #[test]
    fn death_drops_inventory_and_records_event() {
        let mut world = world_with_two(Position::new(0, 0), Position::new(5, 5));
        world.entity_mut(EntityId(2)).unwrap().inventory = vec![7, 8];
        handle_death(&mut world, EntityId(2), Some(1));
        assert_eq!(world.ground_items.len(), 1);
        assert_eq!(world.ground_items[0].items, vec![7, 8]);
    }

    #[test]
    fn registry_has_all_required_and_channelled_kinds() {
        let registry = HandlerRegistry::default();
        for kind in [
            ActionKind::Move,
            ActionKind::Combat,
            ActionKind::Rest,
            ActionKind::Loot,
            ActionKind::Harvest,
            ActionKind::Trade,
            ActionKind::UseItem,
            ActionKind::Craft,
            ActionKind::LearnSkill,
        ] {
            assert!(registry.get(kind).is_some());
        }
    }
}
