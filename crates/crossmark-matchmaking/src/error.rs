//! Error types for the matchmaking queue.

use crossmark_protocol::PlayerId;

/// Errors returned by [`MatchmakingQueue::request_match`](crate::MatchmakingQueue::request_match).
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    /// The request carried no player identity.
    #[error("an authenticated player is required to request a match")]
    AuthenticationRequired,

    /// The player is seated in, or reserved for, a match.
    #[error("player {0} is already in a match")]
    AlreadyInMatch(PlayerId),

    /// An opponent was found but the match could not be created. The
    /// opponent keeps their place at the head of the queue.
    #[error("failed to create match: {0}")]
    MatchCreation(#[source] Box<dyn std::error::Error + Send + Sync>),
}
