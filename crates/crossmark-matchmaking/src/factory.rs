//! How the queue creates matches.

use crossmark_match::{MatchError, MatchRegistry, OutcomeReporter};
use crossmark_protocol::{MatchId, Mode, PlayerId};

/// Creates matches on behalf of the queue.
///
/// `create_match` is called inside the queue's critical section, so it
/// must be quick and must not call back into the queue.
pub trait MatchFactory: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Creates an empty match in `Waiting` for `mode`, reserved for
    /// `players`. Once this returns, [`is_in_match`](Self::is_in_match)
    /// holds for both of them, before either is seated.
    fn create_match(&self, mode: Mode, players: [PlayerId; 2]) -> Result<MatchId, Self::Error>;

    /// Whether the player is seated in, or reserved for, a match.
    fn is_in_match(&self, player: PlayerId) -> bool;
}

impl<R: OutcomeReporter> MatchFactory for MatchRegistry<R> {
    type Error = MatchError;

    fn create_match(&self, mode: Mode, players: [PlayerId; 2]) -> Result<MatchId, MatchError> {
        self.create_match_for(mode, &players)
    }

    fn is_in_match(&self, player: PlayerId) -> bool {
        self.player_match(player).is_some()
    }
}
