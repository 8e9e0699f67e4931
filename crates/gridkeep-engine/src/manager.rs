//! Engine manager (C10): wraps the tick loop in a background thread and
//! exposes start/pause/resume/step/reset, atomic snapshot publication and
//! speed control.
//!
//! Publication uses `arc_swap::ArcSwap` rather than a `Mutex<Arc<Snapshot>>`
//! -- readers take an uncontended atomic load with no chance of blocking
//! behind the writer, which matters because the writer (the tick thread)
//! must never wait on a reader to make forward progress.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use arc_swap::ArcSwap;
use gridkeep_ecs::snapshot::Snapshot;

use crate::config::EngineConfig;
use crate::replay::ActionLog;
use crate::tick::{RunState, TickLoop};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    Start,
    Pause,
    Resume,
    Step,
    Reset,
    SetSpeed(u32),
}

#[derive(Debug, Clone)]
pub struct EngineStats {
    pub tick: u64,
    pub alive_count: u64,
    pub spawn_count: u64,
    pub death_count: u64,
    pub degraded_tick_count: u64,
    pub running: bool,
    pub paused: bool,
    pub last_error: Option<String>,
}

struct SharedCounters {
    tick: AtomicU64,
    alive_count: AtomicU64,
    spawn_count: AtomicU64,
    death_count: AtomicU64,
    degraded_tick_count: AtomicU64,
    running: AtomicBool,
    paused: AtomicBool,
}

impl Default for SharedCounters {
    fn default() -> Self {
        Self {
            tick: AtomicU64::new(0),
            alive_count: AtomicU64::new(0),
            spawn_count: AtomicU64::new(0),
            death_count: AtomicU64::new(0),
            degraded_tick_count: AtomicU64::new(0),
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
        }
    }
}

/// Background-thread wrapper around a [`TickLoop`]. `current_snapshot` and
/// `submit_control` are the only two operations callers reach for from
/// another thread; everything else about the tick loop's internals stays
/// private to the background thread.
pub struct EngineManager {
    snapshot: Arc<ArcSwap<Snapshot>>,
    counters: Arc<SharedCounters>,
    last_error: Arc<std::sync::Mutex<Option<String>>>,
    action_log: Arc<std::sync::Mutex<ActionLog>>,
    control_tx: mpsc::Sender<ControlCommand>,
    handle: Option<JoinHandle<()>>,
}

impl EngineManager {
    pub fn spawn(config: EngineConfig) -> Result<Self, crate::error::EngineError> {
        config.validate()?;

        let mut engine = TickLoop::new(config.clone());
        let initial_snapshot = Snapshot::from_world(engine.world());
        let snapshot = Arc::new(ArcSwap::from_pointee(initial_snapshot));
        let counters = Arc::new(SharedCounters::default());
        let last_error = Arc::new(std::sync::Mutex::new(None));
        let action_log = Arc::new(std::sync::Mutex::new(ActionLog::new()));

        let (control_tx, control_rx) = mpsc::channel::<ControlCommand>();

        let thread_snapshot = Arc::clone(&snapshot);
        let thread_counters = Arc::clone(&counters);
        let thread_last_error = Arc::clone(&last_error);
        let thread_action_log = Arc::clone(&action_log);
        let mut tick_interval = config.tick_interval();
        let mut run_state = RunState::Running;

        let handle = std::thread::Builder::new()
            .name("gridkeep-tick-loop".into())
            .spawn(move || {
                loop {
                    if !thread_counters.running.load(Ordering::Acquire) {
                        break;
                    }

                    let mut step_once = false;
                    for cmd in control_rx.try_iter() {
                        match cmd {
                            ControlCommand::Start => run_state = RunState::Running,
                            ControlCommand::Pause => run_state = RunState::Paused,
                            ControlCommand::Resume => run_state = RunState::Running,
                            ControlCommand::Step => step_once = true,
                            ControlCommand::Reset => {
                                engine.reset();
                                *thread_action_log.lock().expect("action_log mutex poisoned") = ActionLog::new();
                                thread_counters.spawn_count.store(0, Ordering::Release);
                                thread_counters.death_count.store(0, Ordering::Release);
                                thread_counters.degraded_tick_count.store(0, Ordering::Release);
                            }
                            ControlCommand::SetSpeed(tps) if tps > 0 => {
                                tick_interval = std::time::Duration::from_secs_f64(1.0 / tps as f64);
                            }
                            ControlCommand::SetSpeed(_) => {}
                        }
                    }
                    thread_counters.paused.store(run_state == RunState::Paused, Ordering::Release);

                    if run_state == RunState::Paused && !step_once {
                        std::thread::sleep(std::time::Duration::from_millis(5));
                        continue;
                    }

                    let tick_started_at = Instant::now();
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| engine.run_tick()));

                    match result {
                        Ok((outcome, published)) => {
                            thread_action_log
                                .lock()
                                .expect("action_log mutex poisoned")
                                .record(outcome.tick, outcome.accepted);
                            thread_snapshot.store(published.clone());
                            thread_counters.tick.store(published.tick, Ordering::Release);
                            thread_counters.alive_count.store(published.entities.len() as u64, Ordering::Release);
                            thread_counters.spawn_count.store(engine.spawn_count, Ordering::Release);
                            thread_counters.death_count.store(engine.death_count, Ordering::Release);
                            thread_counters.degraded_tick_count.store(engine.degraded_tick_count, Ordering::Release);

                            if let Some(max_ticks) = config.max_ticks {
                                if engine.world().tick >= max_ticks {
                                    thread_counters.running.store(false, Ordering::Release);
                                    break;
                                }
                            }
                        }
                        Err(_) => {
                            *thread_last_error.lock().expect("last_error mutex poisoned") =
                                Some("tick loop panicked; engine stopped".to_string());
                            thread_counters.running.store(false, Ordering::Release);
                            break;
                        }
                    }

                    if step_once {
                        run_state = RunState::Paused;
                        thread_counters.paused.store(true, Ordering::Release);
                    } else {
                        let elapsed = tick_started_at.elapsed();
                        if elapsed < tick_interval {
                            std::thread::sleep(tick_interval - elapsed);
                        }
                    }
                }
            })
            .expect("failed to spawn tick loop thread");

        Ok(Self { snapshot, counters, last_error, action_log, control_tx, handle: Some(handle) })
    }

    /// A copy of the action log recorded so far. Pairing this with
    /// `(seed, config)` is sufficient for `replay::replay` to reconstruct
    /// any tick deterministically.
    pub fn action_log(&self) -> ActionLog {
        self.action_log.lock().expect("action_log mutex poisoned").clone()
    }

    /// Latest published snapshot via an atomic reference load. Never
    /// blocks the tick loop thread.
    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    /// Non-blocking command enqueue; the caller observes effect via
    /// subsequent `stats()` and snapshots.
    pub fn submit_control(&self, cmd: ControlCommand) {
        let _ = self.control_tx.send(cmd);
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            tick: self.counters.tick.load(Ordering::Acquire),
            alive_count: self.counters.alive_count.load(Ordering::Acquire),
            spawn_count: self.counters.spawn_count.load(Ordering::Acquire),
            death_count: self.counters.death_count.load(Ordering::Acquire),
            degraded_tick_count: self.counters.degraded_tick_count.load(Ordering::Acquire),
            running: self.counters.running.load(Ordering::Acquire),
            paused: self.counters.paused.load(Ordering::Acquire),
            last_error: self.last_error.lock().expect("last_error mutex poisoned").clone(),
        }
    }

    /// Signal the background thread to stop and join it. Safe to call more
    /// than once.
    pub fn shutdown(&mut self) {
        self.counters.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EngineManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> EngineConfig {
        EngineConfig { grid_width: 16, grid_height: 16, initial_entity_count: 3, tick_rate: 200, ..EngineConfig::default() }
    }

    #[test]
    fn manager_advances_ticks_and_publishes_snapshots() {
        let mut manager = EngineManager::spawn(test_config()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(100));
        let stats = manager.stats();
        assert!(stats.tick > 0, "expected at least one tick to have run");
        assert!(stats.running);
        manager.shutdown();
    }

    #[test]
    fn pause_stops_tick_advancement() {
        let mut manager = EngineManager::spawn(test_config()).unwrap();
        manager.submit_control(ControlCommand::Pause);
        std::thread::sleep(std::time::Duration::from_millis(50));
        let tick_at_pause = manager.stats().tick;
        std::thread::sleep(std::time::Duration::from_millis(100));
        assert_eq!(manager.stats().tick, tick_at_pause);
        manager.shutdown();
    }

    #[test]
    fn step_advances_exactly_one_tick_while_paused() {
        let mut manager = EngineManager::spawn(test_config()).unwrap();
        manager.submit_control(ControlCommand::Pause);
        std::thread::sleep(std::time::Duration::from_millis(50));
        let before = manager.stats().tick;
        manager.submit_control(ControlCommand::Step);
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(manager.stats().tick, before + 1);
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(manager.stats().tick, before + 1, "step must not free-run past one tick");
        manager.shutdown();
    }

    #[test]
    fn reset_returns_tick_counter_to_zero() {
        let mut manager = EngineManager::spawn(test_config()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
        manager.submit_control(ControlCommand::Reset);
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(manager.stats().tick < 5);
        manager.shutdown();
    }

    #[test]
    fn invalid_config_is_rejected_before_spawning_a_thread() {
        let bad = EngineConfig { num_workers: 0, ..EngineConfig::default() };
        assert!(EngineManager::spawn(bad).is_err());
    }
}
