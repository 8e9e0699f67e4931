//! Parallel AI worker pool (C6): consumes (snapshot, entity_id) tasks and
//! emits exactly one proposal per task onto the action queue.
//!
//! Built on a dedicated `rayon::ThreadPool` rather than the global rayon
//! pool, so the engine's worker count is an explicit config knob
//! (`num_workers`) independent of whatever else shares the process.
//! Cancellation is cooperative: a shared `AtomicBool` is checked between
//! scorer evaluations (never mid-scorer), so a deadline trip discards only
//! not-yet-started work, matching the "no worker ever blocks on I/O, tasks
//! are CPU-only" contract.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gridkeep_ecs::snapshot::Snapshot;
use rayon::prelude::*;

use crate::goals::{self, GoalScorer};
use crate::queue::{ActionQueue, ActionQueueSender};

pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WorkerRunStats {
    pub dispatched: u64,
    pub completed: u64,
    pub skipped_on_deadline: u64,
    pub skipped_on_panic: u64,
}

impl WorkerPool {
    pub fn new(num_workers: usize) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|i| format!("gridkeep-worker-{i}"))
            .build()
            .expect("worker thread pool configuration is always valid");
        Self { pool }
    }

    /// Evaluate `entity_ids` against `snapshot` in parallel, pushing one
    /// proposal per entity onto `queue`. Entities past `deadline` from
    /// `started_at` are skipped entirely rather than racing to finish --
    /// a skipped entity proposes nothing this tick and is picked up again
    /// next tick since its `next_act_at` was never advanced.
    pub fn evaluate_all(
        &self,
        snapshot: &Arc<Snapshot>,
        entity_ids: &[u64],
        registry: &[Box<dyn GoalScorer>],
        queue_sender: &ActionQueueSender,
        deadline: Duration,
        started_at: Instant,
    ) -> WorkerRunStats {
        let completed = AtomicU64::new(0);
        let skipped_on_deadline = AtomicU64::new(0);
        let skipped_on_panic = AtomicU64::new(0);
        let cancelled = AtomicBool::new(false);

        self.pool.install(|| {
            entity_ids.par_iter().for_each(|&entity_id| {
                if cancelled.load(Ordering::Relaxed) || started_at.elapsed() >= deadline {
                    cancelled.store(true, Ordering::Relaxed);
                    skipped_on_deadline.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                let Some(entity) = snapshot.entity(entity_id) else { return };

                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    goals::evaluate(registry, snapshot, entity)
                }));

                match result {
                    Ok(proposal) => {
                        queue_sender.push(proposal);
                        completed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(_) => {
                        skipped_on_panic.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        });

        WorkerRunStats {
            dispatched: entity_ids.len() as u64,
            completed: completed.into_inner(),
            skipped_on_deadline: skipped_on_deadline.into_inner(),
            skipped_on_panic: skipped_on_panic.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridkeep_ecs::position::Position;
    use gridkeep_ecs::tile::{Grid, TileKind};
    use gridkeep_ecs::world::{Entity, World};

    fn snapshot_with_entities(n: u64) -> Arc<Snapshot> {
        let mut world = World::new(1, Grid::filled(32, 32, TileKind::Floor), 1024);
        for i in 0..n {
            let id = world.allocate_id();
            world.add_entity(Entity::new(id, "hero", Position::new(i as i32, 0), "players"));
        }
        Arc::new(Snapshot::from_world(&world))
    }

    #[test]
    fn evaluate_all_produces_one_proposal_per_entity() {
        let pool = WorkerPool::new(2);
        let snapshot = snapshot_with_entities(5);
        let ids: Vec<u64> = snapshot.entities.iter().map(|e| e.id.0).collect();
        let registry = goals::default_registry(0.25);
        let queue = ActionQueue::new();
        let stats = pool.evaluate_all(&snapshot, &ids, &registry, &queue.sender(), Duration::from_secs(1), Instant::now());
        assert_eq!(stats.completed, 5);
        assert_eq!(queue.drain_all().len(), 5);
    }

    #[test]
    fn expired_deadline_skips_remaining_entities() {
        let pool = WorkerPool::new(1);
        let snapshot = snapshot_with_entities(10);
        let ids: Vec<u64> = snapshot.entities.iter().map(|e| e.id.0).collect();
        let registry = goals::default_registry(0.25);
        let queue = ActionQueue::new();
        let stats = pool.evaluate_all(
            &snapshot,
            &ids,
            &registry,
            &queue.sender(),
            Duration::from_nanos(0),
            Instant::now(),
        );
        assert!(stats.skipped_on_deadline >= 1);
    }

    #[test]
    fn unknown_entity_id_is_skipped_without_panicking() {
        let pool = WorkerPool::new(1);
        let snapshot = snapshot_with_entities(1);
        let registry = goals::default_registry(0.25);
        let queue = ActionQueue::new();
        let stats = pool.evaluate_all(&snapshot, &[9999], &registry, &queue.sender(), Duration::from_secs(1), Instant::now());
        assert_eq!(stats.completed, 0);
        assert!(queue.drain_all().is_empty());
    }
}
