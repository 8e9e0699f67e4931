//! Action proposals: an entity's intent to act, produced by a worker and
//! subject to validation and conflict resolution before it ever touches
//! world state.

use gridkeep_ecs::position::Position;
use serde::{Deserialize, Serialize};

/// Fixed priority order used by the resolver's canonical sort: lower
/// ordinal wins. `Combat < Move < Loot < Rest < everything else`, with the
/// channelled kinds ordered arbitrarily but *consistently* among
/// themselves -- their relative order only matters when two of the same
/// kind target the same resource, which the handler's own validation
/// guards against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionKind {
    Combat,
    Move,
    Loot,
    Rest,
    Harvest,
    Trade,
    UseItem,
    Craft,
    LearnSkill,
}

impl ActionKind {
    pub fn priority(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProposalPayload {
    None,
    Text(String),
    SkillId(String),
    ItemId(u64),
}

/// Immutable intent to act, produced entirely from a [`Snapshot`](gridkeep_ecs::snapshot::Snapshot)
/// and never mutating anything itself. `tie_breaker` is always `actor_id`
/// (see `ActionKind` doc) -- kept as an explicit field rather than derived
/// implicitly so the resolver's sort key reads as data, not as a side
/// effect of field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub actor_id: u64,
    pub kind: ActionKind,
    pub target_position: Option<Position>,
    pub target_id: Option<u64>,
    pub payload: ProposalPayload,
    pub next_act_at: u64,
    pub tie_breaker: u64,
}

impl Proposal {
    pub fn new(actor_id: u64, kind: ActionKind, next_act_at: u64) -> Self {
        Self {
            actor_id,
            kind,
            target_position: None,
            target_id: None,
            payload: ProposalPayload::None,
            next_act_at,
            tie_breaker: actor_id,
        }
    }

    pub fn with_target_position(mut self, pos: Position) -> Self {
        self.target_position = Some(pos);
        self
    }

    pub fn with_target_id(mut self, id: u64) -> Self {
        self.target_id = Some(id);
        self
    }

    pub fn with_payload(mut self, payload: ProposalPayload) -> Self {
        self.payload = payload;
        self
    }

    /// The resolver's canonical sort key: `(action_kind_priority,
    /// next_act_at, actor_id)`. This ordering is the only externally
    /// visible sequencing of simultaneous actions in a tick.
    pub fn sort_key(&self) -> (u8, u64, u64) {
        (self.kind.priority(), self.next_act_at, self.tie_breaker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combat_outranks_move() {
        assert!(ActionKind::Combat.priority() < ActionKind::Move.priority());
    }

    #[test]
    fn move_outranks_loot_outranks_rest() {
        assert!(ActionKind::Move.priority() < ActionKind::Loot.priority());
        assert!(ActionKind::Loot.priority() < ActionKind::Rest.priority());
    }

    #[test]
    fn rest_outranks_channelled_kinds() {
        assert!(ActionKind::Rest.priority() < ActionKind::Harvest.priority());
    }

    #[test]
    fn sort_key_orders_by_kind_then_tick_then_actor() {
        let a = Proposal::new(5, ActionKind::Move, 10);
        let b = Proposal::new(1, ActionKind::Combat, 10);
        assert!(b.sort_key() < a.sort_key());
    }
}
