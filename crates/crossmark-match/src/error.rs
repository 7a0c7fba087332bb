//! Error types for the match layer.

use crossmark_protocol::{MatchId, PlayerId};

/// Broad category of a [`MatchError`], used to pick a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad move input. Reported to the offending client only; state is
    /// never touched.
    Validation,
    /// No room for the request (match full, registry at capacity).
    Capacity,
    /// The request conflicts with where a match or player is in its
    /// lifecycle.
    Lifecycle,
    /// A collaborator (actor channel) could not be reached.
    Dependency,
}

/// Errors that can occur during match operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("invalid coordinates ({row}, {col}) for a {size}x{size} board")]
    InvalidCoordinates { row: i32, col: i32, size: usize },

    #[error("not your turn")]
    NotYourTurn,

    #[error("cell ({row}, {col}) is already occupied")]
    CellOccupied { row: usize, col: usize },

    #[error("match is not in progress")]
    MatchNotPlaying,

    /// The player is not a participant of the match it addressed.
    #[error("player {0} is not in this match")]
    NotInMatch(PlayerId),

    #[error("match is full")]
    MatchFull,

    #[error("match has already finished")]
    MatchFinished,

    /// The player is already seated in a match.
    #[error("player {0} is already in a match")]
    AlreadyInMatch(PlayerId),

    /// The player has no match to send moves to.
    #[error("player {0} has no active match")]
    NoActiveMatch(PlayerId),

    #[error("match {0} not found")]
    NotFound(MatchId),

    #[error("match capacity exhausted ({0} running)")]
    CapacityExhausted(usize),

    /// The match actor's channel is closed.
    #[error("match {0} is unavailable")]
    Unavailable(MatchId),
}

impl MatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCoordinates { .. }
            | Self::NotYourTurn
            | Self::CellOccupied { .. }
            | Self::MatchNotPlaying
            | Self::NotInMatch(_) => ErrorKind::Validation,
            Self::MatchFull | Self::CapacityExhausted(_) => ErrorKind::Capacity,
            Self::MatchFinished
            | Self::AlreadyInMatch(_)
            | Self::NoActiveMatch(_)
            | Self::NotFound(_) => ErrorKind::Lifecycle,
            Self::Unavailable(_) => ErrorKind::Dependency,
        }
    }
}
