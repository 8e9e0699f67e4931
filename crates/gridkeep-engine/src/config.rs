//! Frozen-at-start engine configuration.
//!
//! Every field here is read once when the engine starts (or on `reset`) and
//! never mutated afterward except `tick_rate`, which `set_speed` is allowed
//! to adjust live -- everything else would change the meaning of a seed and
//! is therefore part of the fingerprint's implicit input, not a runtime
//! knob.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub world_seed: u64,
    pub grid_width: i32,
    pub grid_height: i32,
    pub num_workers: usize,
    pub tick_rate: u32,
    pub max_ticks: Option<u64>,
    pub initial_entity_count: u32,
    pub generator_spawn_interval: u64,
    pub generator_max_entities: u32,
    pub vision_range: i32,
    pub flee_hp_threshold: f64,
    pub event_buffer_capacity: usize,
    pub hero_respawn_ticks: u64,
    pub worker_deadline_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            world_seed: 0,
            grid_width: 64,
            grid_height: 64,
            num_workers: 4,
            tick_rate: 20,
            max_ticks: None,
            initial_entity_count: 20,
            generator_spawn_interval: 100,
            generator_max_entities: 200,
            vision_range: 8,
            flee_hp_threshold: 0.25,
            event_buffer_capacity: 10_000,
            hero_respawn_ticks: 50,
            worker_deadline_ms: 50,
        }
    }
}

impl EngineConfig {
    /// Rejects configurations that cannot be honored. Called once before
    /// the engine starts; a failure here is a startup-fatal config error,
    /// never a mid-run condition.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.grid_width <= 0 || self.grid_height <= 0 {
            return Err(EngineError::Config(format!(
                "grid dimensions must be positive, got {}x{}",
                self.grid_width, self.grid_height
            )));
        }
        if self.num_workers == 0 {
            return Err(EngineError::Config("num_workers must be at least 1".into()));
        }
        if self.tick_rate == 0 {
            return Err(EngineError::Config("tick_rate must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.flee_hp_threshold) {
            return Err(EngineError::Config(format!(
                "flee_hp_threshold must be in [0, 1], got {}",
                self.flee_hp_threshold
            )));
        }
        if self.event_buffer_capacity == 0 {
            return Err(EngineError::Config("event_buffer_capacity must be at least 1".into()));
        }
        let initial = self.initial_entity_count as i64;
        let area = self.grid_width as i64 * self.grid_height as i64;
        if initial > area {
            return Err(EngineError::Config(format!(
                "initial_entity_count ({initial}) exceeds grid area ({area})"
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.tick_rate as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_grid_dimensions() {
        let config = EngineConfig { grid_width: 0, ..EngineConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_workers() {
        let config = EngineConfig { num_workers: 0, ..EngineConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_flee_threshold() {
        let config = EngineConfig { flee_hp_threshold: 1.5, ..EngineConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_too_many_initial_entities() {
        let config = EngineConfig {
            grid_width: 2,
            grid_height: 2,
            initial_entity_count: 100,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn tick_interval_matches_tick_rate() {
        let config = EngineConfig { tick_rate: 20, ..EngineConfig::default() };
        assert_eq!(config.tick_interval(), std::time::Duration::from_millis(50));
    }
}
