//! Action log recording and replay.
//!
//! The log plus `(seed, config)` is sufficient to reconstruct any tick
//! deterministically: replaying re-applies the already-resolved proposals
//! for each recorded tick directly, skipping Schedule/Collect/Resolve
//! entirely, then runs the identical cleanup phase a live tick would.

use serde::{Deserialize, Serialize};

use gridkeep_ecs::snapshot::Snapshot;

use crate::config::EngineConfig;
use crate::proposal::Proposal;
use crate::tick::TickLoop;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub tick: u64,
    pub accepted: Vec<Proposal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    pub records: Vec<TickRecord>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tick: u64, accepted: Vec<Proposal>) {
        self.records.push(TickRecord { tick, accepted });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Replay `log` against a fresh world built from `config`, returning the
/// final snapshot. `config.world_seed` must match the run that produced
/// `log` -- replay does not re-derive anything from the log itself besides
/// the proposals already recorded in it.
pub fn replay(config: EngineConfig, log: &ActionLog) -> Snapshot {
    let mut engine = TickLoop::new(config);
    for record in &log.records {
        engine.replay_tick(&record.accepted);
    }
    Snapshot::from_world(engine.world())
}
