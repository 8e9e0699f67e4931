//! Conflict resolver (C7): the single point where simultaneity across
//! entities is adjudicated. Its determinism is load-bearing -- the same
//! proposal set, sorted the same way, must always accept the same subset.

use std::collections::{HashMap, HashSet};

use gridkeep_ecs::position::Position;
use gridkeep_ecs::snapshot::Snapshot;

use crate::handlers::HandlerRegistry;
use crate::proposal::{ActionKind, Proposal};

#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    OccupiedOrUnwalkable,
    TargetVanished,
    HandlerRejected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    pub proposal: Proposal,
    pub reason: RejectionReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveOutcome {
    pub accepted: Vec<Proposal>,
    pub rejected: Vec<Rejected>,
}

/// Tracks the world-in-progress as accepted proposals are folded in one at
/// a time, without mutating the real snapshot. Only the slice of state the
/// resolver actually needs to adjudicate occupancy and liveness.
struct TentativeWorld<'a> {
    snapshot: &'a Snapshot,
    /// Current position per entity id, overridden as MOVE proposals are
    /// accepted.
    positions: HashMap<u64, Position>,
    /// Entity ids considered dead in the tentative world (accepted COMBAT
    /// can kill a target before a later proposal targets it).
    dead: HashSet<u64>,
    /// Tiles claimed by an accepted MOVE this tick, so a second proposal
    /// into the same tile is rejected even though the tile was empty at
    /// tick start.
    claimed_tiles: HashSet<Position>,
}

impl<'a> TentativeWorld<'a> {
    fn new(snapshot: &'a Snapshot) -> Self {
        let positions = snapshot.entities.iter().map(|e| (e.id.0, e.position)).collect();
        Self { snapshot, positions, dead: HashSet::new(), claimed_tiles: HashSet::new() }
    }

    fn position_of(&self, id: u64) -> Option<Position> {
        self.positions.get(&id).copied()
    }

    fn is_alive(&self, id: u64) -> bool {
        !self.dead.contains(&id) && self.snapshot.entity(id).is_some_and(|e| !e.is_dead())
    }

    fn occupant_at(&self, pos: Position) -> Option<u64> {
        self.positions.iter().find(|(id, &p)| p == pos && self.is_alive(**id)).map(|(&id, _)| id)
    }
}

/// Sort proposals by `(action_kind_priority, next_act_at, actor_id)`,
/// applying each in order against a tentative world seeded from
/// `snapshot`, and split them into accepted and rejected sets.
pub fn resolve(snapshot: &Snapshot, mut proposals: Vec<Proposal>, handlers: &HandlerRegistry) -> ResolveOutcome {
    proposals.sort_by_key(|p| p.sort_key());

    let mut tentative = TentativeWorld::new(snapshot);
    let mut outcome = ResolveOutcome::default();

    for proposal in proposals {
        let verdict = check_proposal(&proposal, &tentative, handlers);
        match verdict {
            Ok(()) => {
                apply_to_tentative(&proposal, &mut tentative);
                outcome.accepted.push(proposal);
            }
            Err(reason) => outcome.rejected.push(Rejected { proposal, reason }),
        }
    }

    outcome
}

fn check_proposal(proposal: &Proposal, tentative: &TentativeWorld, handlers: &HandlerRegistry) -> Result<(), RejectionReason> {
    if !tentative.is_alive(proposal.actor_id) {
        return Err(RejectionReason::TargetVanished);
    }

    match proposal.kind {
        ActionKind::Move => {
            let Some(target) = proposal.target_position else { return Err(RejectionReason::OccupiedOrUnwalkable) };
            if !tentative.snapshot.tile_at(target).is_some_and(|t| t.is_walkable()) {
                return Err(RejectionReason::OccupiedOrUnwalkable);
            }
            if tentative.claimed_tiles.contains(&target) {
                return Err(RejectionReason::OccupiedOrUnwalkable);
            }
            if let Some(occupant) = tentative.occupant_at(target) {
                if occupant != proposal.actor_id {
                    return Err(RejectionReason::OccupiedOrUnwalkable);
                }
            }
        }
        ActionKind::Combat => {
            let Some(target_id) = proposal.target_id else { return Err(RejectionReason::TargetVanished) };
            if !tentative.is_alive(target_id) {
                return Err(RejectionReason::TargetVanished);
            }
        }
        ActionKind::Loot => {
            let Some(pos) = proposal.target_position else { return Err(RejectionReason::TargetVanished) };
            if !tentative.snapshot.ground_items.iter().any(|pile| pile.position == pos) {
                return Err(RejectionReason::TargetVanished);
            }
        }
        _ => {}
    }

    if let Some(handler) = handlers.get(proposal.kind) {
        if !handler.validate(tentative.snapshot, proposal) {
            return Err(RejectionReason::HandlerRejected);
        }
    }

    Ok(())
}

fn apply_to_tentative(proposal: &Proposal, tentative: &mut TentativeWorld) {
    match proposal.kind {
        ActionKind::Move => {
            if let Some(target) = proposal.target_position {
                tentative.positions.insert(proposal.actor_id, target);
                tentative.claimed_tiles.insert(target);
            }
        }
        ActionKind::Combat => {
            // Whether the target actually dies is a question for `apply`
            // (it depends on damage/evasion rolls the resolver never
            // computes); the tentative world only needs to know a
            // proposal was accepted, not its eventual effect.
        }
        _ => {}
    }
}
