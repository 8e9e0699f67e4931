//! Entity identity allocation.
//!
//! Ids are a bare monotonic counter: once handed out, an id is never reused
//! for the lifetime of a run. This is simpler than a generational allocator
//! (no slot recycling, no stale-reference generation check) because nothing
//! in this engine ever needs to detect "this id used to mean something
//! else" -- entities are removed from the world but their id is retired
//! with them, not handed to a newcomer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out strictly increasing [`EntityId`]s starting at 1 (0 is reserved
/// as a sentinel/"no entity" value in places that need one, e.g. default
/// combat target).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityIdAllocator {
    next: u64,
}

impl Default for EntityIdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl EntityIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next += 1;
        id
    }

    /// The id that would be returned by the next call to `allocate`. Used by
    /// snapshot/replay to reconstruct allocator state without replaying
    /// every past allocation.
    pub fn peek_next(&self) -> u64 {
        self.next
    }

    /// Restore an allocator to a specific high-water mark, e.g. when
    /// resuming from a snapshot.
    pub fn restore(next: u64) -> Self {
        Self { next }
    }
}
