//! Timed modifiers attached to an entity: buffs, debuffs and damage-over-time.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    AttackBuff,
    AttackDebuff,
    DefenseBuff,
    DefenseDebuff,
    SpeedBuff,
    SpeedDebuff,
    CritBuff,
    EvasionBuff,
    Poison,
    Regeneration,
    Burning,
}

/// Per-tick multiplicative stat adjustments and/or a flat per-tick HP delta.
/// Applied once per tick while the effect is active, in [`World::advance_effects`](crate::world::World::advance_effects).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub kind: StatusKind,
    /// Entity id that applied the effect, or the entity's own id for
    /// self-inflicted/natural effects (e.g. regeneration).
    pub source: u64,
    pub attack_mult: f64,
    pub defense_mult: f64,
    pub speed_mult: f64,
    pub crit_mult: f64,
    pub evasion_mult: f64,
    /// Flat HP change applied each tick this effect is active (negative for
    /// damage-over-time, positive for regeneration).
    pub hp_delta_per_tick: i64,
    /// Ticks remaining, decremented once per tick by `advance_effects`.
    /// `-1` means the effect is permanent and never expires on its own.
    pub remaining_ticks: i64,
}

impl StatusEffect {
    pub fn is_permanent(&self) -> bool {
        self.remaining_ticks < 0
    }

    pub fn is_expired(&self) -> bool {
        !self.is_permanent() && self.remaining_ticks <= 0
    }

    /// Decrement the remaining-ticks counter by one tick. Permanent effects
    /// are left untouched.
    pub fn tick(&mut self) {
        if !self.is_permanent() {
            self.remaining_ticks -= 1;
        }
    }

    fn neutral(kind: StatusKind, source: u64, remaining_ticks: i64) -> Self {
        Self {
            kind,
            source,
            attack_mult: 1.0,
            defense_mult: 1.0,
            speed_mult: 1.0,
            crit_mult: 1.0,
            evasion_mult: 1.0,
            hp_delta_per_tick: 0,
            remaining_ticks,
        }
    }

    pub fn poison(source: u64, damage_per_tick: i64, duration_ticks: i64) -> Self {
        Self {
            hp_delta_per_tick: -damage_per_tick.abs(),
            ..Self::neutral(StatusKind::Poison, source, duration_ticks)
        }
    }

    pub fn regeneration(source: u64, heal_per_tick: i64, duration_ticks: i64) -> Self {
        Self {
            hp_delta_per_tick: heal_per_tick.abs(),
            ..Self::neutral(StatusKind::Regeneration, source, duration_ticks)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_effect_never_expires() {
        let mut e = StatusEffect::neutral(StatusKind::DefenseBuff, 1, -1);
        for _ in 0..1000 {
            e.tick();
        }
        assert!(!e.is_expired());
        assert!(e.is_permanent());
    }

    #[test]
    fn timed_effect_expires_after_remaining_ticks() {
        let mut e = StatusEffect::neutral(StatusKind::SpeedBuff, 1, 2);
        assert!(!e.is_expired());
        e.tick();
        assert!(!e.is_expired());
        e.tick();
        assert!(e.is_expired());
    }

    #[test]
    fn poison_deals_damage_each_tick() {
        let poison = StatusEffect::poison(7, 5, 3);
        assert_eq!(poison.hp_delta_per_tick, -5);
        assert_eq!(poison.remaining_ticks, 3);
    }

    #[test]
    fn regeneration_heals_each_tick() {
        let regen = StatusEffect::regeneration(7, 5, 3);
        assert_eq!(regen.hp_delta_per_tick, 5);
    }
}
