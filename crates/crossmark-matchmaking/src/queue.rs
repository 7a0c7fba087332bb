//! The matchmaking queue and its pairing protocol.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crossmark_protocol::{MatchId, Mode, PlayerId, Ticket};

use crate::{
    MatchFactory, MatchmakingError, MemoryQueueStore, Notifier, QueueConfig, QueueEntry,
    QueueStore,
};

/// Result of a [`MatchmakingQueue::request_match`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRequest {
    /// No opponent yet; the caller waits for `MATCH_FOUND`.
    Queued { ticket: Ticket, mode: Mode },
    /// Paired with a waiting player. The match exists in `Waiting`; the
    /// caller admits itself, the opponent is notified.
    Paired {
        match_id: MatchId,
        opponent: PlayerId,
        mode: Mode,
    },
}

/// Pairs players waiting for the same mode, first come first served.
///
/// One mutex guards the store. Scanning for an opponent, removing it and
/// creating the match happen under that lock, so two concurrent requests
/// for the same mode always end up as exactly one match. Notifying the
/// waiting player happens after the lock is released.
pub struct MatchmakingQueue<F, N, S = MemoryQueueStore> {
    factory: Arc<F>,
    notifier: Arc<N>,
    config: QueueConfig,
    store: Mutex<S>,
}

impl<F: MatchFactory, N: Notifier> MatchmakingQueue<F, N> {
    pub fn new(factory: Arc<F>, notifier: Arc<N>, config: QueueConfig) -> Self {
        Self::with_store(factory, notifier, config, MemoryQueueStore::new())
    }
}

impl<F: MatchFactory, N: Notifier, S: QueueStore> MatchmakingQueue<F, N, S> {
    pub fn with_store(factory: Arc<F>, notifier: Arc<N>, config: QueueConfig, store: S) -> Self {
        Self {
            factory,
            notifier,
            config,
            store: Mutex::new(store),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Finds an opponent for `caller` or queues them.
    ///
    /// Any earlier entry for the caller is dropped first, so a player is
    /// never queued twice.
    ///
    /// # Errors
    /// - [`MatchmakingError::AuthenticationRequired`] without a caller.
    /// - [`MatchmakingError::AlreadyInMatch`] if the caller is playing.
    /// - [`MatchmakingError::MatchCreation`] if the factory failed; the
    ///   opponent stays at the head of the queue.
    pub fn request_match(
        &self,
        caller: Option<PlayerId>,
        mode: Mode,
    ) -> Result<MatchRequest, MatchmakingError> {
        let player = caller.ok_or(MatchmakingError::AuthenticationRequired)?;

        let (opponent, match_id) = {
            let mut store = self.lock();
            // Checked under the lock: a pairing that reserves this player
            // may have just happened on another thread.
            if self.factory.is_in_match(player) {
                return Err(MatchmakingError::AlreadyInMatch(player));
            }
            if let Some(previous) = store.remove(player) {
                tracing::debug!(%player, mode = %previous.mode, "replacing earlier queue entry");
            }

            let Some(opponent) = store.pop_front(mode) else {
                let ticket = Ticket::new();
                store.push_back(QueueEntry {
                    player,
                    mode,
                    ticket,
                    enqueued_at: Instant::now(),
                });
                tracing::info!(%player, %mode, %ticket, waiting = store.waiting(mode), "player queued");
                return Ok(MatchRequest::Queued { ticket, mode });
            };

            match self.factory.create_match(mode, [opponent.player, player]) {
                Ok(match_id) => (opponent, match_id),
                Err(e) => {
                    tracing::warn!(%player, %mode, error = %e, "match creation failed");
                    store.push_front(opponent);
                    return Err(MatchmakingError::MatchCreation(Box::new(e)));
                }
            }
        };

        tracing::info!(
            %match_id,
            %mode,
            finder = %player,
            waiter = %opponent.player,
            "players paired"
        );

        if let Err(e) = self
            .notifier
            .notify_match_found(opponent.player, match_id, mode)
        {
            tracing::warn!(
                %match_id,
                player = %opponent.player,
                error = %e,
                "match found notification failed"
            );
        }

        Ok(MatchRequest::Paired {
            match_id,
            opponent: opponent.player,
            mode,
        })
    }

    /// Removes the player's entry, if any. Returns whether one existed.
    pub fn cancel_request(&self, player: PlayerId) -> bool {
        let removed = self.lock().remove(player);
        if let Some(entry) = &removed {
            tracing::info!(%player, mode = %entry.mode, "matchmaking cancelled");
        }
        removed.is_some()
    }

    /// Drops entries older than the configured TTL as of `now`. Returns
    /// the dropped entries; nothing is dropped without a TTL.
    pub fn expire_stale(&self, now: Instant) -> Vec<QueueEntry> {
        let Some(ttl) = self.config.entry_ttl else {
            return Vec::new();
        };
        let Some(cutoff) = now.checked_sub(ttl) else {
            return Vec::new();
        };

        let expired = self.lock().remove_older_than(cutoff);
        for entry in &expired {
            tracing::info!(player = %entry.player, mode = %entry.mode, "queue entry expired");
        }
        expired
    }

    pub fn is_queued(&self, player: PlayerId) -> bool {
        self.lock().contains(player)
    }

    /// Players waiting for `mode`.
    pub fn waiting(&self, mode: Mode) -> usize {
        self.lock().waiting(mode)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }
}
