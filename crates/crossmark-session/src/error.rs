//! Error types for the session layer.

use crossmark_protocol::PlayerId;

/// Errors that can occur while identifying players or tracking their
/// connections.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The token was rejected by the [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The player already has a live connection. A player can only be
    /// connected once at a time.
    #[error("player {0} already has an active connection")]
    AlreadyConnected(PlayerId),

    /// The player has no live connection, or its outbound channel closed.
    #[error("player {0} is not connected")]
    NotConnected(PlayerId),
}
