//! Authoritative simulation state: entities, the tile grid, the spatial
//! index, deterministic RNG and the immutable snapshot facility that lets
//! other threads observe world state without touching it.
//!
//! This crate has no notion of a tick loop, a worker pool or action
//! handlers -- those live in `gridkeep-engine`, which depends on this crate
//! for its data model. Keeping the split this way means the state
//! representation can be exercised (and proptested) without pulling in any
//! concurrency machinery at all.

#![deny(unsafe_code)]

pub mod entity;
pub mod events;
pub mod position;
pub mod rng;
pub mod snapshot;
pub mod spatial;
pub mod status;
pub mod tile;
pub mod world;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EcsError {
    #[error("unknown tile kind: {0}")]
    UnknownTile(String),

    #[error("entity {0} not found")]
    EntityNotFound(u64),

    /// Raised only by explicit consistency checks (e.g. a caller that
    /// force-validates the spatial index after a `rebuild_spatial_index`
    /// and still finds a mismatch). `World` recovers from ordinary
    /// desynchronization on its own via the sampled check in
    /// `spatial_index_is_consistent`; reaching this variant means recovery
    /// itself failed, which is a fatal programming bug upstream.
    #[error("spatial index corrupted: {0}")]
    SpatialIndexCorruption(String),

    /// `rng::Domain` is a closed Rust enum, so a caller cannot construct an
    /// invalid domain value -- this variant documents the failure mode the
    /// specification calls for without adding a reachable error path.
    #[error("invalid rng domain")]
    InvalidDomain,
}

pub mod prelude {
    pub use crate::entity::{EntityId, EntityIdAllocator};
    pub use crate::events::{Event, EventKind, EventRingBuffer};
    pub use crate::position::Position;
    pub use crate::rng::{self, Domain};
    pub use crate::snapshot::Snapshot;
    pub use crate::spatial::SpatialIndex;
    pub use crate::status::{StatusEffect, StatusKind};
    pub use crate::tile::{Grid, Tile, TileKind};
    pub use crate::world::{AiState, Entity, World};
    pub use crate::EcsError;
}
