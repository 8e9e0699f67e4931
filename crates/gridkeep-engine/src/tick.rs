//! Tick loop (C9): four-phase per-tick orchestration plus pacing and
//! lifecycle control.
//!
//! Phase 1 (Schedule) and Phase 2 (Collect) talk only to a snapshot handed
//! to the worker pool; Phase 3 (Resolve) and Phase 4 (Cleanup) are the only
//! places world state is mutated, and both run exclusively on whichever
//! thread owns the `TickLoop` (the manager's background thread in
//! production, the calling thread in tests).

use std::sync::Arc;
use std::time::{Duration, Instant};

use gridkeep_ecs::entity::EntityId;
use gridkeep_ecs::position::Position;
use gridkeep_ecs::rng::{self, Domain};
use gridkeep_ecs::snapshot::Snapshot;
use gridkeep_ecs::tile::{Grid, TileKind};
use gridkeep_ecs::world::{Entity, World};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::goals::{self, GoalScorer};
use crate::handlers::HandlerRegistry;
use crate::proposal::Proposal;
use crate::queue::ActionQueue;
use crate::resolver::{self, ResolveOutcome};
use crate::workers::WorkerPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub tick: u64,
    pub accepted: Vec<Proposal>,
    pub rejected: usize,
    pub degraded: bool,
}

struct PendingRespawn {
    kind: String,
    faction: String,
    home: Position,
    due_tick: u64,
}

/// Orchestrates one full tick at a time. Owns the authoritative `World`;
/// nothing outside this struct (or the snapshot it hands to workers) ever
/// sees mutable access to it.
pub struct TickLoop {
    world: World,
    config: EngineConfig,
    goal_registry: Vec<Box<dyn GoalScorer>>,
    handlers: HandlerRegistry,
    workers: WorkerPool,
    queue: ActionQueue,
    pending_respawns: Vec<PendingRespawn>,
    pub state: RunState,
    pub degraded_tick_count: u64,
    pub spawn_count: u64,
    pub death_count: u64,
}

impl TickLoop {
    pub fn new(config: EngineConfig) -> Self {
        let world = build_initial_world(&config);
        let goal_registry = goals::default_registry(config.flee_hp_threshold);
        let workers = WorkerPool::new(config.num_workers);
        Self {
            world,
            config,
            goal_registry,
            handlers: HandlerRegistry::default(),
            workers,
            queue: ActionQueue::new(),
            pending_respawns: Vec::new(),
            state: RunState::Running,
            degraded_tick_count: 0,
            spawn_count: 0,
            death_count: 0,
        }
    }

    /// Build a tick loop around an already-constructed `World` instead of
    /// generating one from `config`. Used by tests and by scenario/save
    /// loading that needs exact starting positions `build_initial_world`'s
    /// RNG placement can't give them; `config` still governs pacing,
    /// worker count and cleanup policy.
    pub fn from_world(world: World, config: EngineConfig) -> Self {
        let goal_registry = goals::default_registry(config.flee_hp_threshold);
        let workers = WorkerPool::new(config.num_workers);
        Self {
            world,
            config,
            goal_registry,
            handlers: HandlerRegistry::default(),
            workers,
            queue: ActionQueue::new(),
            pending_respawns: Vec::new(),
            state: RunState::Running,
            degraded_tick_count: 0,
            spawn_count: 0,
            death_count: 0,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn tick(&self) -> u64 {
        self.world.tick
    }

    /// Reinitialize world state from the engine's seed, discarding all
    /// progress. Cancels nothing mid-flight because `reset` is only ever
    /// invoked between ticks (see lifecycle control in `manager`).
    pub fn reset(&mut self) {
        self.world = build_initial_world(&self.config);
        self.pending_respawns.clear();
        self.degraded_tick_count = 0;
        self.spawn_count = 0;
        self.death_count = 0;
        self.state = RunState::Running;
    }

    /// Run one full tick (Schedule -> Collect -> Resolve -> Cleanup) and
    /// return its outcome plus the freshly published snapshot.
    pub fn run_tick(&mut self) -> (TickOutcome, Arc<Snapshot>) {
        let tick = self.world.tick;

        // Phase 1: Schedule.
        if !self.world.spatial_index_is_consistent() {
            self.world.rebuild_spatial_index();
            if !self.world.spatial_index_is_consistent() {
                let err = EngineError::InvariantViolation(
                    "spatial index corrupted and did not recover after rebuild".to_string(),
                );
                panic!("{err}");
            }
        }
        let schedule_snapshot = Arc::new(Snapshot::from_world(&self.world));
        let eligible: Vec<u64> = self
            .world
            .entities()
            .filter(|e| e.is_eligible_to_act(tick))
            .map(|e| e.id.0)
            .collect();

        // Phase 2: Collect.
        let deadline = Duration::from_millis(self.config.worker_deadline_ms);
        let started_at = Instant::now();
        let run_stats = self.workers.evaluate_all(
            &schedule_snapshot,
            &eligible,
            &self.goal_registry,
            &self.queue.sender(),
            deadline,
            started_at,
        );
        let proposals = self.queue.drain_all();
        let degraded_by_workers = run_stats.skipped_on_deadline > 0 || run_stats.skipped_on_panic > 0;

        // Phase 3: Resolve.
        let ResolveOutcome { accepted, rejected } = resolver::resolve(&schedule_snapshot, proposals, &self.handlers);
        let mut handler_panicked = false;
        for proposal in &accepted {
            if let Some(handler) = self.handlers.get(proposal.kind) {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    handler.apply(&mut self.world, proposal);
                }));
                if result.is_err() {
                    tracing::error!(actor = proposal.actor_id, kind = ?proposal.kind, "handler panicked during apply");
                    handler_panicked = true;
                }
            }
        }
        for rejection in &rejected {
            self.world.record_event(
                EntityId(rejection.proposal.actor_id),
                gridkeep_ecs::events::EventKind::ProposalRejected {
                    action_kind: rejection.proposal.kind.priority(),
                    reason: format!("{:?}", rejection.reason),
                },
            );
        }

        // Phase 4: Cleanup.
        self.run_cleanup();

        let degraded = degraded_by_workers || handler_panicked;
        if degraded {
            self.degraded_tick_count += 1;
        }

        let rejected_count = rejected.len();
        let outcome = TickOutcome { tick, accepted, rejected: rejected_count, degraded };
        let published = Arc::new(Snapshot::from_world(&self.world));
        (outcome, published)
    }

    /// Advance status effects, respawn/remove the dead, run the periodic
    /// spawner, prune completed quests, and advance the tick counter. Only
    /// ever called once per tick, after all proposals for that tick have
    /// been applied.
    fn run_cleanup(&mut self) {
        let tick = self.world.tick;

        let ids: Vec<EntityId> = self.world.entities().map(|e| e.id).collect();
        for id in ids {
            self.world.advance_effects(id);
        }

        let dead_ids: Vec<EntityId> = self.world.entities().filter(|e| e.is_dead()).map(|e| e.id).collect();
        for id in dead_ids {
            if let Some(entity) = self.world.remove_entity(id) {
                self.death_count += 1;
                if entity.faction == "players" {
                    self.pending_respawns.push(PendingRespawn {
                        kind: entity.kind,
                        faction: entity.faction,
                        home: entity.home_position,
                        due_tick: tick + self.config.hero_respawn_ticks,
                    });
                }
            }
        }

        let due: Vec<usize> = self
            .pending_respawns
            .iter()
            .enumerate()
            .filter(|(_, r)| r.due_tick <= tick)
            .map(|(i, _)| i)
            .collect();
        for idx in due.into_iter().rev() {
            let ticket = self.pending_respawns.remove(idx);
            let id = self.world.allocate_id();
            self.world.add_entity(Entity::new(id, ticket.kind, ticket.home, ticket.faction));
            self.spawn_count += 1;
        }

        if self.config.generator_spawn_interval > 0
            && tick > 0
            && tick % self.config.generator_spawn_interval == 0
            && (self.world.entity_count() as u32) < self.config.generator_max_entities
        {
            self.spawn_generated_entity();
        }

        for entity in self.world_entities_with_quests_mut() {
            entity.quests.retain(|q| !q.completed);
        }

        self.world.events.finish_tick(tick);
        self.world.tick += 1;
    }

    fn world_entities_with_quests_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.world.entities_mut()
    }

    fn spawn_generated_entity(&mut self) {
        let tick = self.world.tick;
        let seed = self.world.world_seed;
        let width = self.world.grid.width;
        let height = self.world.grid.height;
        let x = rng::next_int(seed, Domain::Spawn, 0, tick, 0, 0, width as i64) as i32;
        let y = rng::next_int(seed, Domain::Spawn, 0, tick, 1, 0, height as i64) as i32;
        let pos = Position::new(x, y);
        if !self.world.tile_at(pos).is_some_and(|t| t.is_walkable()) {
            return;
        }
        let id = self.world.allocate_id();
        self.world.add_entity(Entity::new(id, "goblin", pos, "wild"));
        self.world.record_event(id, gridkeep_ecs::events::EventKind::Spawned);
        self.spawn_count += 1;
    }

    /// Re-apply an already-resolved list of proposals (from a recorded
    /// action log) and run the same cleanup phase a live tick would. Used
    /// exclusively by `replay`; skips Schedule/Collect/Resolve entirely
    /// because the log already captures their outcome.
    pub(crate) fn replay_tick(&mut self, accepted: &[Proposal]) {
        for proposal in accepted {
            if let Some(handler) = self.handlers.get(proposal.kind) {
                handler.apply(&mut self.world, proposal);
            }
        }
        self.run_cleanup();
    }
}

/// Build the starting world for `config`: an empty grid of floor tiles
/// populated with `initial_entity_count` entities placed deterministically
/// from `world_seed`. Map generation and entity archetypes are placeholder
/// content -- the real catalogs this would read are explicitly out of
/// scope for the core.
pub fn build_initial_world(config: &EngineConfig) -> World {
    let grid = Grid::filled(config.grid_width, config.grid_height, TileKind::Floor);
    let mut world = World::new(config.world_seed, grid, config.event_buffer_capacity);

    for i in 0..config.initial_entity_count as u64 {
        let x = rng::next_int(config.world_seed, Domain::Spawn, i, 0, 0, 0, config.grid_width as i64) as i32;
        let y = rng::next_int(config.world_seed, Domain::Spawn, i, 0, 1, 0, config.grid_height as i64) as i32;
        let pos = Position::new(x, y);
        let (kind, faction) = if i == 0 { ("hero", "players") } else { ("goblin", "wild") };
        let id = world.allocate_id();
        let mut entity = Entity::new(id, kind, pos, faction);
        entity.vision_range = config.vision_range;
        world.add_entity(entity);
    }

    world
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> EngineConfig {
        EngineConfig { grid_width: 16, grid_height: 16, initial_entity_count: 2, num_workers: 2, ..EngineConfig::default() }
    }

    #[test]
    fn run_tick_increments_tick_counter() {
        let mut loop_ = TickLoop::new(test_config());
        assert_eq!(loop_.tick(), 0);
        loop_.run_tick();
        assert_eq!(loop_.tick(), 1);
    }

    #[test]
    fn run_tick_returns_matching_snapshot_tick() {
        let mut loop_ = TickLoop::new(test_config());
        let (outcome, snapshot) = loop_.run_tick();
        assert_eq!(outcome.tick, 0);
        assert_eq!(snapshot.tick, 1);
    }

    #[test]
    fn reset_restores_initial_entity_count() {
        let mut loop_ = TickLoop::new(test_config());
        for _ in 0..20 {
            loop_.run_tick();
        }
        loop_.reset();
        assert_eq!(loop_.tick(), 0);
        assert_eq!(loop_.world().entity_count(), 2);
    }

    #[test]
    fn same_seed_same_tick_count_yields_identical_fingerprint() {
        let mut a = TickLoop::new(test_config());
        let mut b = TickLoop::new(test_config());
        let mut last_a = None;
        let mut last_b = None;
        for _ in 0..30 {
            last_a = Some(a.run_tick().1);
            last_b = Some(b.run_tick().1);
        }
        assert_eq!(last_a.unwrap().fingerprint(), last_b.unwrap().fingerprint());
    }

    #[test]
    fn reset_then_run_matches_fresh_run_fingerprint() {
        let mut engine = TickLoop::new(test_config());
        for _ in 0..15 {
            engine.run_tick();
        }
        engine.reset();
        let mut fp_after_reset = None;
        for _ in 0..15 {
            fp_after_reset = Some(engine.run_tick().1);
        }

        let mut fresh = TickLoop::new(test_config());
        let mut fp_fresh = None;
        for _ in 0..15 {
            fp_fresh = Some(fresh.run_tick().1);
        }

        assert_eq!(fp_after_reset.unwrap().fingerprint(), fp_fresh.unwrap().fingerprint());
    }
}
