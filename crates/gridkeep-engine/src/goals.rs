//! Goal scorers: pure functions of (snapshot, entity) producing a
//! non-negative utility. The highest-scoring goal's handler is invoked to
//! produce exactly one proposal; ties are broken by fixed enumeration
//! order (the order scorers are registered in, see `default_registry`).

use gridkeep_ecs::position::Position;
use gridkeep_ecs::rng::{self, Domain};
use gridkeep_ecs::snapshot::Snapshot;
use gridkeep_ecs::world::Entity;

use crate::proposal::{ActionKind, Proposal};

pub trait GoalScorer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Non-negative utility of pursuing this goal right now. `0.0` means
    /// "not applicable."
    fn score(&self, snapshot: &Snapshot, entity: &Entity) -> f64;

    /// Produce the single proposal this goal wants to make. Only called
    /// for the highest-scoring goal; must not mutate anything -- it reads
    /// only `snapshot` and `entity`.
    fn propose(&self, snapshot: &Snapshot, entity: &Entity) -> Proposal;
}

/// Attack the nearest living entity of a different faction within weapon
/// range, or close distance toward it if not yet in range.
pub struct HuntGoal;

impl GoalScorer for HuntGoal {
    fn name(&self) -> &'static str {
        "hunt"
    }

    fn score(&self, snapshot: &Snapshot, entity: &Entity) -> f64 {
        let hp_ratio = entity.hp as f64 / entity.max_hp.max(1) as f64;
        if hp_ratio < 0.25 {
            return 0.0;
        }
        match nearest_enemy(snapshot, entity) {
            Some(_) => 0.7,
            None => 0.0,
        }
    }

    fn propose(&self, snapshot: &Snapshot, entity: &Entity) -> Proposal {
        let target = nearest_enemy(snapshot, entity).expect("propose only called when score > 0");
        if entity.position.is_adjacent(target.position) {
            Proposal::new(entity.id.0, ActionKind::Combat, entity.next_act_at)
                .with_target_id(target.id.0)
        } else {
            let step = step_toward(entity.position, target.position, snapshot);
            Proposal::new(entity.id.0, ActionKind::Move, entity.next_act_at)
                .with_target_position(step)
        }
    }
}

/// Retreat from the nearest threat when hp drops below the configured
/// flee threshold.
pub struct FleeGoal {
    pub flee_hp_threshold: f64,
}

impl GoalScorer for FleeGoal {
    fn name(&self) -> &'static str {
        "flee"
    }

    fn score(&self, snapshot: &Snapshot, entity: &Entity) -> f64 {
        let hp_ratio = entity.hp as f64 / entity.max_hp.max(1) as f64;
        if hp_ratio >= self.flee_hp_threshold {
            return 0.0;
        }
        if nearest_enemy(snapshot, entity).is_some() {
            1.0
        } else {
            0.0
        }
    }

    fn propose(&self, snapshot: &Snapshot, entity: &Entity) -> Proposal {
        let threat = nearest_enemy(snapshot, entity).expect("propose only called when score > 0");
        let away = step_away(entity.position, threat.position, snapshot);
        Proposal::new(entity.id.0, ActionKind::Move, entity.next_act_at).with_target_position(away)
    }
}

/// Pick up a ground item pile at the entity's current tile or an adjacent
/// one. Scoring ignores bag capacity on purpose: a full bag still wants to
/// loot, it just gets rejected by `LootHandler::validate` every tick until
/// it has room, which is the rejection behavior this goal exists to drive.
pub struct LootGoal;

impl GoalScorer for LootGoal {
    fn name(&self) -> &'static str {
        "loot"
    }

    fn score(&self, snapshot: &Snapshot, entity: &Entity) -> f64 {
        match nearest_pile(snapshot, entity.position) {
            Some(_) => 0.5,
            None => 0.0,
        }
    }

    fn propose(&self, snapshot: &Snapshot, entity: &Entity) -> Proposal {
        let pos = nearest_pile(snapshot, entity.position).expect("propose only called when score > 0");
        Proposal::new(entity.id.0, ActionKind::Loot, entity.next_act_at).with_target_position(pos)
    }
}

fn nearest_pile(snapshot: &Snapshot, from: Position) -> Option<Position> {
    snapshot
        .ground_items
        .iter()
        .map(|pile| pile.position)
        .filter(|&pos| from.manhattan_distance(pos) <= 1)
        .min_by_key(|&pos| from.manhattan_distance(pos))
}

/// Rest when below full hp/stamina and no threat is nearby.
pub struct RestGoal;

impl GoalScorer for RestGoal {
    fn name(&self) -> &'static str {
        "rest"
    }

    fn score(&self, snapshot: &Snapshot, entity: &Entity) -> f64 {
        let needs_rest = entity.hp < entity.max_hp || entity.stamina < entity.max_stamina;
        if needs_rest && nearest_enemy(snapshot, entity).is_none() {
            0.4
        } else {
            0.0
        }
    }

    fn propose(&self, _snapshot: &Snapshot, entity: &Entity) -> Proposal {
        Proposal::new(entity.id.0, ActionKind::Rest, entity.next_act_at)
    }
}

/// Wander one tile in a deterministic pseudo-random direction. The
/// fallback goal: always applicable, always lowest utility, so it only
/// fires when nothing else wants to.
pub struct WanderGoal;

impl GoalScorer for WanderGoal {
    fn name(&self) -> &'static str {
        "wander"
    }

    fn score(&self, _snapshot: &Snapshot, _entity: &Entity) -> f64 {
        0.1
    }

    fn propose(&self, snapshot: &Snapshot, entity: &Entity) -> Proposal {
        let neighbors = entity.position.neighbors4();
        let walkable: Vec<Position> = neighbors
            .into_iter()
            .filter(|&p| snapshot.tile_at(p).is_some_and(|t| t.is_walkable()))
            .collect();
        let target = rng::choice(snapshot.world_seed, Domain::Movement, entity.id.0, snapshot.tick, 0, &walkable)
            .copied()
            .unwrap_or(entity.position);
        Proposal::new(entity.id.0, ActionKind::Move, entity.next_act_at).with_target_position(target)
    }
}

fn nearest_enemy<'a>(snapshot: &'a Snapshot, entity: &Entity) -> Option<&'a Entity> {
    snapshot
        .entities
        .iter()
        .filter(|other| other.id != entity.id && other.faction != entity.faction && !other.is_dead())
        .filter(|other| entity.position.manhattan_distance(other.position) <= entity.vision_range as i64)
        .min_by_key(|other| (entity.position.manhattan_distance(other.position), other.id.0))
}

/// One Manhattan step from `from` toward `to`, preferring the axis with the
/// larger remaining distance, falling back to staying put if every
/// reasonable step is blocked.
fn step_toward(from: Position, to: Position, snapshot: &Snapshot) -> Position {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let candidates = if dx.abs() >= dy.abs() {
        [Position::new(from.x + dx.signum(), from.y), Position::new(from.x, from.y + dy.signum())]
    } else {
        [Position::new(from.x, from.y + dy.signum()), Position::new(from.x + dx.signum(), from.y)]
    };
    candidates
        .into_iter()
        .find(|&p| p != from && snapshot.tile_at(p).is_some_and(|t| t.is_walkable()))
        .unwrap_or(from)
}

fn step_away(from: Position, threat: Position, snapshot: &Snapshot) -> Position {
    let dx = (from.x - threat.x).signum();
    let dy = (from.y - threat.y).signum();
    let primary = Position::new(from.x + dx, from.y + dy);
    let fallback = [Position::new(from.x + dx, from.y), Position::new(from.x, from.y + dy)];
    std::iter::once(primary)
        .chain(fallback)
        .find(|&p| p != from && snapshot.tile_at(p).is_some_and(|t| t.is_walkable()))
        .unwrap_or(from)
}

/// Fixed registration order: the order scorers are pushed here *is* the
/// tie-break order when two goals score equally.
pub fn default_registry(flee_hp_threshold: f64) -> Vec<Box<dyn GoalScorer>> {
    vec![
        Box::new(FleeGoal { flee_hp_threshold }),
        Box::new(HuntGoal),
        Box::new(LootGoal),
        Box::new(RestGoal),
        Box::new(WanderGoal),
    ]
}

/// Evaluate every registered scorer and invoke the highest-utility one.
/// Ties go to whichever scorer appears earlier in `registry`.
pub fn evaluate(registry: &[Box<dyn GoalScorer>], snapshot: &Snapshot, entity: &Entity) -> Proposal {
    let mut best_idx = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (idx, scorer) in registry.iter().enumerate() {
        let score = scorer.score(snapshot, entity);
        if score > best_score {
            best_score = score;
            best_idx = idx;
        }
    }
    registry[best_idx].propose(snapshot, entity)
}
