//! Property tests for the universal invariants the world store must
//! uphold regardless of the sequence of operations applied to it: hp
//! bounds, inventory bounds, and spatial-index/entity-position agreement.

use gridkeep_ecs::position::Position;
use gridkeep_ecs::tile::{Grid, TileKind};
use gridkeep_ecs::world::{Entity, World};
use proptest::prelude::*;

fn fresh_world() -> World {
    World::new(1, Grid::filled(32, 32, TileKind::Floor), 256)
}

proptest! {
    #[test]
    fn hp_never_leaves_bounds_under_arbitrary_damage(deltas in prop::collection::vec(-500i64..500, 0..50)) {
        let mut world = fresh_world();
        let id = world.allocate_id();
        world.add_entity(Entity::new(id, "hero", Position::new(0, 0), "players"));

        for delta in deltas {
            world.apply_damage(id, delta);
            let entity = world.entity(id).unwrap();
            prop_assert!(entity.hp >= 0 && entity.hp <= entity.max_hp);
        }
    }

    #[test]
    fn inventory_never_exceeds_bag_capacity(drops in prop::collection::vec(1u64..10_000, 0..40), capacity in 0usize..10) {
        let mut world = fresh_world();
        let id = world.allocate_id();
        let mut entity = Entity::new(id, "hero", Position::new(0, 0), "players");
        entity.bag_capacity = capacity;
        world.add_entity(entity);

        for item in drops {
            world.drop_items(Position::new(0, 0), vec![item]);
            world.pick_up_items(id, Position::new(0, 0));
            let entity = world.entity(id).unwrap();
            prop_assert!(entity.inventory.len() <= entity.bag_capacity);
        }
    }

    #[test]
    fn spatial_index_matches_positions_after_arbitrary_moves(
        moves in prop::collection::vec((0i32..32, 0i32..32), 0..60)
    ) {
        let mut world = fresh_world();
        let id = world.allocate_id();
        world.add_entity(Entity::new(id, "hero", Position::new(0, 0), "players"));

        for (x, y) in moves {
            world.move_entity(id, Position::new(x, y));
            let entity = world.entity(id).unwrap();
            prop_assert!(world.spatial().at(entity.position).contains(&id.0));
        }
    }

    #[test]
    fn no_two_live_entities_share_a_tile_after_disjoint_spawns(
        positions in prop::collection::vec((0i32..8, 0i32..8), 1..8)
    ) {
        let mut world = fresh_world();
        let mut occupied = std::collections::HashSet::new();
        for (x, y) in positions {
            let pos = Position::new(x, y);
            if occupied.contains(&pos) {
                continue;
            }
            occupied.insert(pos);
            let id = world.allocate_id();
            world.add_entity(Entity::new(id, "goblin", pos, "wild"));
        }

        let mut seen = std::collections::HashSet::new();
        for entity in world.entities() {
            prop_assert!(seen.insert(entity.position), "two entities share tile {:?}", entity.position);
        }
    }
}
