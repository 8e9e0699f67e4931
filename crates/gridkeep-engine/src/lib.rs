//! Concurrency, scheduling and conflict resolution for the grid-world
//! simulation built on `gridkeep_ecs`'s state representation.
//!
//! The crate boundary mirrors the single-writer discipline it implements:
//! `gridkeep_ecs::World` is mutated exclusively by [`tick::TickLoop`],
//! which runs on whichever thread [`manager::EngineManager`] puts it on.
//! Workers, resolvers and handlers in between only ever see a
//! [`gridkeep_ecs::snapshot::Snapshot`] or the live world passed in by the
//! tick loop itself -- nothing here reaches for a lock on world state
//! because nothing outside the owning thread holds a reference to it.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod goals;
pub mod handlers;
pub mod manager;
pub mod proposal;
pub mod queue;
pub mod replay;
pub mod resolver;
pub mod tick;
pub mod workers;

pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::error::EngineError;
    pub use crate::manager::{ControlCommand, EngineManager, EngineStats};
    pub use crate::proposal::{ActionKind, Proposal};
    pub use crate::replay::{self, ActionLog};
    pub use crate::tick::{TickLoop, TickOutcome};
}
