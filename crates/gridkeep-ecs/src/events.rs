//! World events recorded during tick processing: combat hits, deaths,
//! pickups, spawns. Consumed by UI/logging layers, never by gameplay logic
//! itself (events are an observation channel, not additional state).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    Moved { from_x: i32, from_y: i32, to_x: i32, to_y: i32 },
    AttackLanded { target: u64, damage: i64, crit: bool },
    AttackMissed { target: u64 },
    Died { killer: Option<u64> },
    ItemDropped { item_count: u32 },
    ItemPickedUp { item_count: u32 },
    Spawned,
    StatusApplied { kind: crate::status::StatusKind },
    StatusExpired { kind: crate::status::StatusKind },
    EventsDropped { count: u64 },
    /// Recorded by the resolver (`gridkeep_engine::resolver`) for every
    /// proposal it rejects. `action_kind` is the proposal's
    /// `ActionKind::priority()` ordinal -- this crate has no dependency on
    /// the engine crate's `ActionKind` enum, so the numeric priority is
    /// the common currency between them.
    ProposalRejected { action_kind: u8, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub tick: u64,
    pub actor: u64,
    pub kind: EventKind,
}

/// A fixed-capacity FIFO of events. Once full, the oldest entry is evicted
/// to make room for the new one -- a long-running engine must have a flat
/// memory ceiling for this buffer, and recent events matter more than old
/// ones to anything observing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRingBuffer {
    capacity: usize,
    events: VecDeque<Event>,
    dropped_this_tick: u64,
}

impl EventRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity.min(1024)),
            dropped_this_tick: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        if self.events.len() >= self.capacity {
            self.events.pop_front();
            self.dropped_this_tick += 1;
        }
        self.events.push_back(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Called once per tick by the tick loop: flushes accumulated overflow
    /// into a single `EventsDropped` event (if any occurred) and resets the
    /// counter. Keeps overflow visible without letting it spam the buffer.
    pub fn finish_tick(&mut self, tick: u64) {
        if self.dropped_this_tick > 0 {
            let count = self.dropped_this_tick;
            self.dropped_this_tick = 0;
            self.push(Event {
                tick,
                actor: 0,
                kind: EventKind::EventsDropped { count },
            });
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.dropped_this_tick = 0;
    }
}
