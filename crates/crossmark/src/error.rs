//! Unified error type for the Crossmark server.

use crossmark_match::MatchError;
use crossmark_matchmaking::MatchmakingError;
use crossmark_protocol::ProtocolError;
use crossmark_session::SessionError;
use crossmark_transport::TransportError;

/// Top-level error wrapping every layer's error type, so `?` works across
/// layers in the server code.
#[derive(Debug, thiserror::Error)]
pub enum CrossmarkError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Matchmaking(#[from] MatchmakingError),

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossmark_protocol::{MatchId, PlayerId};

    #[test]
    fn test_from_protocol_error() {
        let err: CrossmarkError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, CrossmarkError::Protocol(_)));
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_from_session_error() {
        let err: CrossmarkError = SessionError::AuthFailed("nope".into()).into();
        assert!(matches!(err, CrossmarkError::Session(_)));
    }

    #[test]
    fn test_from_match_error() {
        let id = MatchId::new();
        let err: CrossmarkError = MatchError::NotFound(id).into();
        assert!(matches!(err, CrossmarkError::Match(_)));
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_from_matchmaking_error() {
        let err: CrossmarkError = MatchmakingError::AlreadyInMatch(PlayerId(3)).into();
        assert!(matches!(err, CrossmarkError::Matchmaking(_)));
        assert_eq!(err.to_string(), "player P-3 is already in a match");
    }
}
