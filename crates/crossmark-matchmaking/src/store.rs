//! Queue storage.
//!
//! The queue's pairing logic only needs a handful of operations on its
//! waiting entries; [`QueueStore`] names them so the storage can be
//! swapped (or sharded by mode) without touching the pairing code.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use crossmark_protocol::{Mode, PlayerId, Ticket};

/// A player waiting for an opponent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub player: PlayerId,
    pub mode: Mode,
    pub ticket: Ticket,
    /// Used for expiry and ordering only.
    pub enqueued_at: Instant,
}

/// Storage for waiting entries. Holds at most one entry per player.
///
/// Implementations are not synchronized; the queue guards its store with a
/// single mutex.
pub trait QueueStore: Send + 'static {
    /// Appends an entry at the back of its mode's queue. The caller has
    /// already removed any previous entry for the same player.
    fn push_back(&mut self, entry: QueueEntry);

    /// Puts an entry back at the head of its mode's queue.
    fn push_front(&mut self, entry: QueueEntry);

    /// Removes and returns the oldest entry waiting for `mode`.
    fn pop_front(&mut self, mode: Mode) -> Option<QueueEntry>;

    /// Removes the player's entry, whatever its mode.
    fn remove(&mut self, player: PlayerId) -> Option<QueueEntry>;

    fn contains(&self, player: PlayerId) -> bool;

    /// Removes every entry enqueued before `cutoff`.
    fn remove_older_than(&mut self, cutoff: Instant) -> Vec<QueueEntry>;

    /// Entries waiting for `mode`.
    fn waiting(&self, mode: Mode) -> usize;

    /// Entries across all modes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory store: one FIFO per mode plus a player index.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    queues: HashMap<Mode, VecDeque<QueueEntry>>,
    index: HashMap<PlayerId, Mode>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueueStore for MemoryQueueStore {
    fn push_back(&mut self, entry: QueueEntry) {
        self.index.insert(entry.player, entry.mode);
        self.queues.entry(entry.mode).or_default().push_back(entry);
    }

    fn push_front(&mut self, entry: QueueEntry) {
        self.index.insert(entry.player, entry.mode);
        self.queues.entry(entry.mode).or_default().push_front(entry);
    }

    fn pop_front(&mut self, mode: Mode) -> Option<QueueEntry> {
        let entry = self.queues.get_mut(&mode)?.pop_front()?;
        self.index.remove(&entry.player);
        Some(entry)
    }

    fn remove(&mut self, player: PlayerId) -> Option<QueueEntry> {
        let mode = self.index.remove(&player)?;
        let queue = self.queues.get_mut(&mode)?;
        let pos = queue.iter().position(|e| e.player == player)?;
        queue.remove(pos)
    }

    fn contains(&self, player: PlayerId) -> bool {
        self.index.contains_key(&player)
    }

    fn remove_older_than(&mut self, cutoff: Instant) -> Vec<QueueEntry> {
        let mut expired = Vec::new();
        for queue in self.queues.values_mut() {
            // Entries are in enqueue order, except ones restored at the
            // head, so scan the whole queue.
            let mut kept = VecDeque::with_capacity(queue.len());
            for entry in queue.drain(..) {
                if entry.enqueued_at < cutoff {
                    expired.push(entry);
                } else {
                    kept.push_back(entry);
                }
            }
            *queue = kept;
        }
        for entry in &expired {
            self.index.remove(&entry.player);
        }
        expired
    }

    fn waiting(&self, mode: Mode) -> usize {
        self.queues.get(&mode).map_or(0, VecDeque::len)
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}
