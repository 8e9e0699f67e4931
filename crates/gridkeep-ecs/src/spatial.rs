//! O(1) neighbor and occupancy queries keyed by tile position.
//!
//! Internally a hash map from position to the small set of entity ids
//! standing there, maintained incrementally by [`SpatialIndex::insert`],
//! [`SpatialIndex::remove`] and [`SpatialIndex::move_entity`]. The index is
//! a derived structure, not authoritative state -- [`World`](crate::world::World)
//! owns positions; the index exists purely to make `at`/`in_radius`/`nearest`
//! O(1)-ish instead of an O(n) scan over every entity.

use std::collections::HashMap;

use crate::position::Position;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpatialIndex {
    occupants: HashMap<Position, Vec<u64>>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u64, pos: Position) {
        let bucket = self.occupants.entry(pos).or_default();
        if !bucket.contains(&id) {
            bucket.push(id);
        }
    }

    pub fn remove(&mut self, id: u64, pos: Position) {
        if let Some(bucket) = self.occupants.get_mut(&pos) {
            bucket.retain(|&existing| existing != id);
            if bucket.is_empty() {
                self.occupants.remove(&pos);
            }
        }
    }

    pub fn move_entity(&mut self, id: u64, old: Position, new: Position) {
        if old == new {
            return;
        }
        self.remove(id, old);
        self.insert(id, new);
    }

    pub fn at(&self, pos: Position) -> &[u64] {
        self.occupants.get(&pos).map_or(&[], |v| v.as_slice())
    }

    pub fn in_radius(&self, center: Position, radius: i64) -> impl Iterator<Item = u64> + '_ {
        self.occupants.iter().filter_map(move |(&pos, ids)| {
            (center.manhattan_distance(pos) <= radius).then_some(ids)
        }).flatten().copied()
    }

    /// The closest occupant (by Manhattan distance, ties broken by lowest
    /// id) for which `predicate` holds. `O(n)` over all occupied tiles --
    /// acceptable at the entity counts this engine targets (~100s).
    pub fn nearest(&self, center: Position, predicate: impl Fn(u64) -> bool) -> Option<u64> {
        let mut best: Option<(i64, u64)> = None;
        for (&pos, ids) in &self.occupants {
            let dist = center.manhattan_distance(pos);
            for &id in ids {
                if !predicate(id) {
                    continue;
                }
                match best {
                    Some((best_dist, best_id)) if (dist, id) >= (best_dist, best_id) => {}
                    _ => best = Some((dist, id)),
                }
            }
        }
        best.map(|(_, id)| id)
    }

    pub fn len(&self) -> usize {
        self.occupants.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    pub fn clear(&mut self) {
        self.occupants.clear();
    }
}
