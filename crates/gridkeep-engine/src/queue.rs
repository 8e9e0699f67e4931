//! Thread-safe multi-producer single-consumer queue of action proposals.
//!
//! `std::sync::mpsc` already provides exactly this shape: `Sender` is
//! `Clone + Send`, so every worker gets its own clone to push through, and
//! the tick loop holds the single `Receiver`. Preserving enqueue order is
//! only guaranteed per-producer-thread, which is all the resolver needs --
//! it imposes its own canonical order downstream and never relies on queue
//! order for correctness.

use std::sync::mpsc;

use crate::proposal::Proposal;

pub struct ActionQueue {
    sender: mpsc::Sender<Proposal>,
    receiver: mpsc::Receiver<Proposal>,
}

impl Default for ActionQueue {
    fn default() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cloneable handle workers use to push proposals without touching
    /// the receiving half.
    pub fn sender(&self) -> ActionQueueSender {
        ActionQueueSender { sender: self.sender.clone() }
    }

    /// Drain every proposal currently queued. Bulk and `O(n)`; called once
    /// per tick at the end of Phase 2. The queue is empty after this call.
    pub fn drain_all(&self) -> Vec<Proposal> {
        self.receiver.try_iter().collect()
    }
}

#[derive(Clone)]
pub struct ActionQueueSender {
    sender: mpsc::Sender<Proposal>,
}

impl ActionQueueSender {
    pub fn push(&self, proposal: Proposal) {
        // The receiver never disconnects while the owning ActionQueue is
        // alive, and workers never outlive the tick that spawned them, so
        // a send failure here would mean the queue was dropped out from
        // under a still-running worker -- a logic bug, not a runtime
        // condition to recover from.
        let _ = self.sender.send(proposal);
    }
}
