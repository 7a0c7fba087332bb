//! Live player connections and their outbound channels.
//!
//! Each connected player owns an unbounded channel of [`OpMessage`]s. The
//! connection task drains it onto the socket; everything else (matches,
//! the matchmaking queue) only ever pushes into it. Pushing never blocks,
//! so a slow client can't stall a match.

use std::collections::HashMap;
use std::sync::RwLock;

use crossmark_protocol::{OpMessage, PlayerId};
use tokio::sync::mpsc;

use crate::SessionError;

/// Sending half of a player's outbound channel.
pub type PlayerSender = mpsc::UnboundedSender<OpMessage>;

/// Registry of currently connected players.
///
/// Internally synchronized; share it behind an `Arc`. Locks are held only
/// for map access, never across an `.await`.
#[derive(Debug, Default)]
pub struct Presences {
    senders: RwLock<HashMap<PlayerId, PlayerSender>>,
}

impl Presences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a live connection for `player`.
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`] if the player already has one.
    pub fn connect(&self, player: PlayerId, sender: PlayerSender) -> Result<(), SessionError> {
        let mut senders = self.write();
        if senders.get(&player).is_some_and(|s| !s.is_closed()) {
            return Err(SessionError::AlreadyConnected(player));
        }
        senders.insert(player, sender);
        tracing::debug!(%player, "presence connected");
        Ok(())
    }

    /// Drops the player's presence. Idempotent.
    pub fn disconnect(&self, player: PlayerId) -> bool {
        let removed = self.write().remove(&player).is_some();
        if removed {
            tracing::debug!(%player, "presence disconnected");
        }
        removed
    }

    /// Returns a clone of the player's outbound sender.
    pub fn sender(&self, player: PlayerId) -> Option<PlayerSender> {
        self.read().get(&player).cloned()
    }

    pub fn is_connected(&self, player: PlayerId) -> bool {
        self.read().get(&player).is_some_and(|s| !s.is_closed())
    }

    /// Pushes `msg` onto the player's outbound channel.
    ///
    /// # Errors
    /// [`SessionError::NotConnected`] if the player is unknown or the
    /// channel has been closed by its connection task.
    pub fn send(&self, player: PlayerId, msg: OpMessage) -> Result<(), SessionError> {
        let sender = self.sender(player).ok_or(SessionError::NotConnected(player))?;
        sender
            .send(msg)
            .map_err(|_| SessionError::NotConnected(player))
    }

    /// All connected players, sorted by id.
    pub fn list(&self) -> Vec<PlayerId> {
        let mut players: Vec<PlayerId> = self.read().keys().copied().collect();
        players.sort();
        players
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<PlayerId, PlayerSender>> {
        self.senders.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<PlayerId, PlayerSender>> {
        self.senders.write().unwrap_or_else(|e| e.into_inner())
    }
}
