//! How the queue tells a waiting player they were paired.

use crossmark_protocol::{MatchFoundPayload, MatchId, Mode, OpMessage, PlayerId};
use crossmark_session::{Presences, SessionError};

/// Delivers `MATCH_FOUND` to the player who was waiting in the queue.
///
/// Called after the queue lock is released. A failure is logged by the
/// queue and otherwise ignored.
pub trait Notifier: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn notify_match_found(
        &self,
        player: PlayerId,
        match_id: MatchId,
        mode: Mode,
    ) -> Result<(), Self::Error>;
}

impl Notifier for Presences {
    type Error = SessionError;

    fn notify_match_found(
        &self,
        player: PlayerId,
        match_id: MatchId,
        mode: Mode,
    ) -> Result<(), SessionError> {
        self.send(
            player,
            OpMessage::MatchFound(MatchFoundPayload { match_id, mode }),
        )
    }
}
