//! Per-connection handler: handshake, auth, matchmaking and move routing.
//!
//! Each accepted connection gets its own Tokio task running this handler:
//!   1. Receive Handshake → validate version → authenticate
//!   2. Register the player's presence (their outbound channel)
//!   3. Loop: client frames in, match traffic out, until close or idle

use std::sync::Arc;
use std::time::Instant;

use crossmark_match::{ErrorKind, MatchError, OutcomeReporter};
use crossmark_matchmaking::{MatchRequest, MatchmakingError};
use crossmark_protocol::{
    Codec, Envelope, MatchFoundPayload, OpMessage, Payload, PlayerId, ProtocolError,
    SystemMessage, decode_inbound,
};
use crossmark_session::{Authenticator, PlayerSender};
use crossmark_transport::{ConnectionReader, ConnectionWriter, WebSocketConnection};
use tokio::sync::mpsc;

use crate::CrossmarkError;
use crate::server::{PROTOCOL_VERSION, ServerState};

/// Cleans up after a player when the handler exits, even on panic.
///
/// Queue and presence cleanup are synchronous. Leaving the match needs the
/// match actor, so it runs on a spawned task, scoped to the match the
/// player was in at drop time.
struct SessionGuard<A: Authenticator, R: OutcomeReporter, C: Codec> {
    player_id: PlayerId,
    state: Arc<ServerState<A, R, C>>,
}

impl<A: Authenticator, R: OutcomeReporter, C: Codec> Drop for SessionGuard<A, R, C> {
    fn drop(&mut self) {
        let player_id = self.player_id;
        self.state.queue.cancel_request(player_id);
        self.state.presences.disconnect(player_id);

        if let Some(match_id) = self.state.matches.player_match(player_id) {
            let matches = Arc::clone(&self.state.matches);
            tokio::spawn(async move {
                matches.leave_match(match_id, player_id).await;
            });
        }
        tracing::info!(%player_id, "player disconnected");
    }
}

/// Writes envelopes to the client with increasing sequence numbers.
struct Outbox<'a, C: Codec> {
    writer: ConnectionWriter,
    codec: &'a C,
    seq: u64,
    start: Instant,
}

impl<C: Codec> Outbox<'_, C> {
    async fn send(&mut self, payload: Payload) -> Result<(), CrossmarkError> {
        let envelope = Envelope {
            seq: next_seq(&mut self.seq),
            timestamp: self.start.elapsed().as_millis() as u64,
            payload,
        };
        let bytes = self.codec.encode(&envelope)?;
        self.writer.send(&bytes).await?;
        Ok(())
    }

    async fn system(&mut self, msg: SystemMessage) -> Result<(), CrossmarkError> {
        self.send(Payload::System(msg)).await
    }

    async fn op(&mut self, msg: OpMessage) -> Result<(), CrossmarkError> {
        self.send(Payload::Op(msg)).await
    }

    /// Sends a `SystemMessage::Error` to the client.
    async fn error(&mut self, code: u16, message: impl Into<String>) -> Result<(), CrossmarkError> {
        self.system(SystemMessage::Error {
            code,
            message: message.into(),
        })
        .await
    }

    fn millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, R, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, R, C>>,
) -> Result<(), CrossmarkError>
where
    A: Authenticator,
    R: OutcomeReporter,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let (writer, mut reader) = conn.split();
    let mut out = Outbox {
        writer,
        codec: &state.codec,
        seq: 0,
        start: Instant::now(),
    };

    // --- Step 1: Handshake ---
    let player_id = perform_handshake(&mut reader, &mut out, &state).await?;

    // --- Step 2: Presence ---
    let (tx, mut rx) = mpsc::unbounded_channel::<OpMessage>();
    if let Err(e) = state.presences.connect(player_id, tx.clone()) {
        out.error(409, e.to_string()).await?;
        let _ = out.writer.close().await;
        return Err(e.into());
    }
    let _guard = SessionGuard {
        player_id,
        state: Arc::clone(&state),
    };

    out.system(SystemMessage::HandshakeAck {
        player_id,
        server_time: out.millis(),
    })
    .await?;
    tracing::info!(%conn_id, %player_id, "player connected");

    // --- Step 3: Message loop ---
    let idle_timeout = state.config.idle_timeout;
    let idle = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            frame = reader.recv() => {
                idle.as_mut().reset(tokio::time::Instant::now() + idle_timeout);
                let data = match frame {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%player_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%player_id, error = %e, "recv error");
                        break;
                    }
                };
                if handle_frame(&mut out, &state, player_id, &tx, &data).await? {
                    break;
                }
            }
            Some(msg) = rx.recv() => {
                forward(&mut out, &state, player_id, &tx, msg).await?;
            }
            _ = &mut idle => {
                tracing::info!(%player_id, "connection timed out");
                break;
            }
        }
    }

    // _guard drops here → queue entry, match seat and presence released.
    Ok(())
}

/// Receives the Handshake, checks the version and authenticates.
async fn perform_handshake<A, R, C>(
    reader: &mut ConnectionReader,
    out: &mut Outbox<'_, C>,
    state: &ServerState<A, R, C>,
) -> Result<PlayerId, CrossmarkError>
where
    A: Authenticator,
    R: OutcomeReporter,
    C: Codec,
{
    let data = match tokio::time::timeout(state.config.handshake_timeout, reader.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before handshake".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope = match decode_inbound(&state.codec, &data) {
        Ok(envelope) => envelope,
        Err(e) => {
            out.error(400, "malformed handshake").await?;
            return Err(e.into());
        }
    };

    let (version, token) = match envelope.payload {
        Payload::System(SystemMessage::Handshake { version, token }) => (version, token),
        _ => {
            out.error(400, "expected Handshake").await?;
            return Err(ProtocolError::InvalidMessage("first message must be Handshake".into()).into());
        }
    };

    if version != PROTOCOL_VERSION {
        out.error(
            400,
            format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    let token = token.as_deref().unwrap_or("");
    match state.auth.authenticate(token).await {
        Ok(player_id) => Ok(player_id),
        Err(e) => {
            out.error(401, e.to_string()).await?;
            Err(e.into())
        }
    }
}

/// Handles one client frame. Returns `true` if the connection should close.
async fn handle_frame<A, R, C>(
    out: &mut Outbox<'_, C>,
    state: &ServerState<A, R, C>,
    player_id: PlayerId,
    tx: &PlayerSender,
    data: &[u8],
) -> Result<bool, CrossmarkError>
where
    A: Authenticator,
    R: OutcomeReporter,
    C: Codec,
{
    let envelope = match decode_inbound(&state.codec, data) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(%player_id, error = %e, "rejected inbound frame");
            out.error(400, e.to_string()).await?;
            return Ok(false);
        }
    };

    match envelope.payload {
        Payload::System(msg) => handle_system_message(out, state, player_id, tx, msg).await,
        Payload::Op(OpMessage::Move(mv)) => {
            if let Err(e) = state.matches.submit_move(player_id, mv.row, mv.col).await {
                match e.kind() {
                    // The match already sent ERROR to this player.
                    ErrorKind::Validation => {}
                    _ => out.error(match_error_code(&e), e.to_string()).await?,
                }
            }
            Ok(false)
        }
        Payload::Op(other) => {
            // decode_inbound only lets client-bound opcodes through.
            tracing::debug!(%player_id, opcode = %other.opcode(), "ignoring op message");
            Ok(false)
        }
    }
}

/// Handles a system message. Returns `true` if the connection should close.
async fn handle_system_message<A, R, C>(
    out: &mut Outbox<'_, C>,
    state: &ServerState<A, R, C>,
    player_id: PlayerId,
    tx: &PlayerSender,
    msg: SystemMessage,
) -> Result<bool, CrossmarkError>
where
    A: Authenticator,
    R: OutcomeReporter,
    C: Codec,
{
    match msg {
        SystemMessage::Heartbeat { client_time } => {
            let server_time = out.millis();
            out.system(SystemMessage::HeartbeatAck {
                client_time,
                server_time,
            })
            .await?;
        }

        SystemMessage::StartMatchmaking { mode } => {
            match state.queue.request_match(Some(player_id), mode) {
                Ok(MatchRequest::Queued { ticket, mode }) => {
                    out.system(SystemMessage::MatchmakingStarted {
                        ticket: Some(ticket),
                        match_id: None,
                        mode,
                    })
                    .await?;
                }
                Ok(MatchRequest::Paired { match_id, mode, .. }) => {
                    match state.matches.admit(match_id, player_id, tx.clone()).await {
                        Ok(()) => {
                            out.system(SystemMessage::MatchmakingStarted {
                                ticket: None,
                                match_id: Some(match_id),
                                mode,
                            })
                            .await?;
                        }
                        Err(e) => out.error(match_error_code(&e), e.to_string()).await?,
                    }
                }
                Err(e) => out.error(matchmaking_error_code(&e), e.to_string()).await?,
            }
        }

        SystemMessage::StopMatchmaking { ticket } => {
            let removed = state.queue.cancel_request(player_id);
            tracing::debug!(%player_id, ?ticket, removed, "stop matchmaking");
            out.system(SystemMessage::MatchmakingStopped { success: true })
                .await?;
        }

        SystemMessage::LeaveMatch => {
            if let Some(match_id) = state.matches.leave(player_id).await {
                tracing::info!(%player_id, %match_id, "player left match");
            }
        }

        SystemMessage::Disconnect { reason } => {
            tracing::info!(%player_id, %reason, "client disconnected");
            return Ok(true);
        }

        other => {
            tracing::debug!(%player_id, ?other, "unexpected system message");
            out.error(400, "unexpected system message").await?;
        }
    }

    Ok(false)
}

/// Forwards a message from the player's outbound channel to the socket.
///
/// `MATCH_FOUND` is the asynchronous half of a pairing: the player is
/// seated in the match first, and only told about it if that worked.
async fn forward<A, R, C>(
    out: &mut Outbox<'_, C>,
    state: &ServerState<A, R, C>,
    player_id: PlayerId,
    tx: &PlayerSender,
    msg: OpMessage,
) -> Result<(), CrossmarkError>
where
    A: Authenticator,
    R: OutcomeReporter,
    C: Codec,
{
    if let OpMessage::MatchFound(MatchFoundPayload { match_id, .. }) = &msg {
        if let Err(e) = state.matches.admit(*match_id, player_id, tx.clone()).await {
            tracing::info!(%player_id, %match_id, error = %e, "could not join paired match");
            return out
                .op(OpMessage::error(format!("match no longer available: {e}")))
                .await;
        }
    }
    out.op(msg).await
}

fn match_error_code(e: &MatchError) -> u16 {
    match e {
        MatchError::NoActiveMatch(_) | MatchError::NotFound(_) => 404,
        _ => match e.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Capacity | ErrorKind::Lifecycle => 409,
            ErrorKind::Dependency => 503,
        },
    }
}

fn matchmaking_error_code(e: &MatchmakingError) -> u16 {
    match e {
        MatchmakingError::AuthenticationRequired => 403,
        MatchmakingError::AlreadyInMatch(_) => 409,
        MatchmakingError::MatchCreation(_) => 503,
    }
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossmark_protocol::MatchId;

    #[test]
    fn test_next_seq_increments() {
        let mut seq = 5;
        assert_eq!(next_seq(&mut seq), 5);
        assert_eq!(next_seq(&mut seq), 6);
        assert_eq!(seq, 7);
    }

    #[test]
    fn test_match_error_code() {
        assert_eq!(match_error_code(&MatchError::NoActiveMatch(PlayerId(1))), 404);
        assert_eq!(match_error_code(&MatchError::NotFound(MatchId::new())), 404);
        assert_eq!(match_error_code(&MatchError::NotYourTurn), 400);
        assert_eq!(match_error_code(&MatchError::MatchFull), 409);
        assert_eq!(match_error_code(&MatchError::MatchFinished), 409);
        assert_eq!(match_error_code(&MatchError::Unavailable(MatchId::new())), 503);
    }

    #[test]
    fn test_matchmaking_error_code() {
        assert_eq!(matchmaking_error_code(&MatchmakingError::AuthenticationRequired), 403);
        assert_eq!(
            matchmaking_error_code(&MatchmakingError::AlreadyInMatch(PlayerId(1))),
            409
        );
    }
}
