//! Match registry: owns every running match and knows who plays where.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crossmark_protocol::{MatchId, Mode, PlayerId};
use crossmark_session::PlayerSender;
use tokio::sync::mpsc;

use crate::actor::spawn_match;
use crate::{MatchConfig, MatchError, MatchHandle, MatchInfo, OutcomeReporter};

struct Inner {
    matches: HashMap<MatchId, MatchHandle>,
    /// A player is in at most one match at a time.
    player_matches: HashMap<PlayerId, MatchId>,
    retired: mpsc::UnboundedReceiver<MatchId>,
}

impl Inner {
    /// Forgets matches whose actors reported finished or closed.
    fn prune(&mut self) {
        while let Ok(match_id) = self.retired.try_recv() {
            if self.matches.remove(&match_id).is_some() {
                self.player_matches.retain(|_, m| *m != match_id);
                tracing::info!(%match_id, "match retired");
            }
        }
    }
}

/// Creates matches, routes players to them and retires them when they end.
///
/// Internally synchronized. The lock only covers map lookups; every await
/// on a match actor happens with the lock released.
pub struct MatchRegistry<R: OutcomeReporter> {
    config: MatchConfig,
    reporter: Arc<R>,
    retired_tx: mpsc::UnboundedSender<MatchId>,
    inner: Mutex<Inner>,
}

impl<R: OutcomeReporter> MatchRegistry<R> {
    pub fn new(config: MatchConfig, reporter: Arc<R>) -> Self {
        let (retired_tx, retired) = mpsc::unbounded_channel();
        Self {
            config,
            reporter,
            retired_tx,
            inner: Mutex::new(Inner {
                matches: HashMap::new(),
                player_matches: HashMap::new(),
                retired,
            }),
        }
    }

    pub fn reporter(&self) -> &Arc<R> {
        &self.reporter
    }

    /// Creates a match in `Waiting` and spawns its actor. Must be called
    /// from within a Tokio runtime.
    pub fn create_match(&self, mode: Mode) -> Result<MatchId, MatchError> {
        self.create_match_for(mode, &[])
    }

    /// Creates a match and reserves it for `players`: from here on they
    /// count as in this match until they leave or it retires, even before
    /// their own [`admit`](Self::admit) lands.
    pub fn create_match_for(&self, mode: Mode, players: &[PlayerId]) -> Result<MatchId, MatchError> {
        let mut inner = self.lock();
        if let Some(player) = players
            .iter()
            .copied()
            .find(|p| inner.player_matches.contains_key(p))
        {
            return Err(MatchError::AlreadyInMatch(player));
        }
        if let Some(max) = self.config.max_matches {
            if inner.matches.len() >= max {
                return Err(MatchError::CapacityExhausted(inner.matches.len()));
            }
        }

        let match_id = MatchId::new();
        let handle = spawn_match(
            match_id,
            mode,
            Arc::clone(&self.reporter),
            self.retired_tx.clone(),
            self.config.join_timeout,
            self.config.channel_size,
        );
        inner.matches.insert(match_id, handle);
        for &player in players {
            inner.player_matches.insert(player, match_id);
        }
        tracing::info!(%match_id, %mode, reserved = players.len(), "match created");
        Ok(match_id)
    }

    /// Seats `player` in `match_id`. Outbound messages for the player go to
    /// `sender`.
    ///
    /// A player reserved for `match_id` by
    /// [`create_match_for`](Self::create_match_for) is let through; any
    /// other current match is a conflict.
    pub async fn admit(
        &self,
        match_id: MatchId,
        player: PlayerId,
        sender: PlayerSender,
    ) -> Result<(), MatchError> {
        let handle = {
            let mut inner = self.lock();
            if let Some(current) = inner.player_matches.get(&player) {
                if *current != match_id {
                    return Err(MatchError::AlreadyInMatch(player));
                }
            }
            let handle = match inner.matches.get(&match_id).cloned() {
                Some(handle) => handle,
                None => {
                    inner.player_matches.remove(&player);
                    return Err(MatchError::NotFound(match_id));
                }
            };
            // Reserve the seat so a concurrent admit elsewhere fails.
            inner.player_matches.insert(player, match_id);
            handle
        };

        let result = handle.admit(player, sender).await;
        match &result {
            // Already seated here: the index is right as it is.
            Ok(()) | Err(MatchError::AlreadyInMatch(_)) => {}
            Err(_) => {
                let mut inner = self.lock();
                if inner.player_matches.get(&player) == Some(&match_id) {
                    inner.player_matches.remove(&player);
                }
            }
        }
        result
    }

    /// Routes a move to the player's current match.
    pub async fn submit_move(&self, player: PlayerId, row: i32, col: i32) -> Result<(), MatchError> {
        let handle = self
            .handle_for(player)
            .ok_or(MatchError::NoActiveMatch(player))?;
        handle.submit_move(player, row, col).await
    }

    /// Removes the player from their match, if any. Never fails; returns the
    /// match they left.
    pub async fn leave(&self, player: PlayerId) -> Option<MatchId> {
        let match_id = self.player_match(player)?;
        self.leave_match(match_id, player).await.then_some(match_id)
    }

    /// Removes the player from `match_id` only if that is still their
    /// match. Returns whether they were removed.
    pub async fn leave_match(&self, match_id: MatchId, player: PlayerId) -> bool {
        let handle = {
            let mut inner = self.lock();
            if inner.player_matches.get(&player) != Some(&match_id) {
                return false;
            }
            inner.player_matches.remove(&player);
            inner.matches.get(&match_id).cloned()
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.leave(player).await {
                tracing::debug!(%match_id, %player, error = %e, "leave on stopped match");
            }
        }
        true
    }

    pub async fn info(&self, match_id: MatchId) -> Result<MatchInfo, MatchError> {
        let handle = {
            let inner = self.lock();
            inner
                .matches
                .get(&match_id)
                .cloned()
                .ok_or(MatchError::NotFound(match_id))?
        };
        handle.info().await
    }

    pub fn player_match(&self, player: PlayerId) -> Option<MatchId> {
        self.lock().player_matches.get(&player).copied()
    }

    /// Number of matches still running.
    pub fn match_count(&self) -> usize {
        self.lock().matches.len()
    }

    /// Stops every match actor.
    pub async fn shutdown(&self) {
        let handles: Vec<MatchHandle> = {
            let mut inner = self.lock();
            inner.player_matches.clear();
            inner.matches.drain().map(|(_, h)| h).collect()
        };
        for handle in handles {
            let _ = handle.shutdown().await;
        }
        tracing::info!("match registry shut down");
    }

    fn handle_for(&self, player: PlayerId) -> Option<MatchHandle> {
        let inner = self.lock();
        let match_id = inner.player_matches.get(&player)?;
        inner.matches.get(match_id).cloned()
    }

    /// Locks the maps, pruning retired matches first.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.prune();
        inner
    }
}
