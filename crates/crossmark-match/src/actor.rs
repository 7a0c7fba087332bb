//! Match actor: one Tokio task per match.
//!
//! Every command for a match goes through its channel and is handled to
//! completion before the next one, so moves, admissions and departures
//! for the same match never interleave.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use crossmark_protocol::{MatchId, Mode, OpMessage, Phase, PlayerId, StatePayload};
use crossmark_session::PlayerSender;
use tokio::sync::{mpsc, oneshot};

use crate::{Effect, MatchEngine, MatchError, OutcomeReporter, Recipient};

/// Commands sent to a match actor.
pub(crate) enum MatchCommand {
    Admit {
        player: PlayerId,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), MatchError>>,
    },
    Move {
        player: PlayerId,
        row: i32,
        col: i32,
        reply: oneshot::Sender<Result<(), MatchError>>,
    },
    Leave {
        player: PlayerId,
        reply: oneshot::Sender<()>,
    },
    Info {
        reply: oneshot::Sender<MatchInfo>,
    },
    Shutdown,
}

/// A snapshot of one match.
#[derive(Debug, Clone)]
pub struct MatchInfo {
    pub match_id: MatchId,
    pub mode: Mode,
    pub phase: Phase,
    /// Players still present, in join order.
    pub players: Vec<PlayerId>,
    pub state: StatePayload,
}

/// Handle to a running match actor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MatchHandle {
    match_id: MatchId,
    sender: mpsc::Sender<MatchCommand>,
}

impl MatchHandle {
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    pub async fn admit(&self, player: PlayerId, sender: PlayerSender) -> Result<(), MatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::Admit {
            player,
            sender,
            reply,
        })
        .await?;
        rx.await.map_err(|_| MatchError::Unavailable(self.match_id))?
    }

    /// Submits a move. A rejected move has already been reported to the
    /// player as an `ERROR` message when this returns.
    pub async fn submit_move(&self, player: PlayerId, row: i32, col: i32) -> Result<(), MatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::Move {
            player,
            row,
            col,
            reply,
        })
        .await?;
        rx.await.map_err(|_| MatchError::Unavailable(self.match_id))?
    }

    pub async fn leave(&self, player: PlayerId) -> Result<(), MatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::Leave { player, reply }).await?;
        rx.await.map_err(|_| MatchError::Unavailable(self.match_id))
    }

    pub async fn info(&self) -> Result<MatchInfo, MatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::Info { reply }).await?;
        rx.await.map_err(|_| MatchError::Unavailable(self.match_id))
    }

    pub async fn shutdown(&self) -> Result<(), MatchError> {
        self.send(MatchCommand::Shutdown).await
    }

    async fn send(&self, cmd: MatchCommand) -> Result<(), MatchError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| MatchError::Unavailable(self.match_id))
    }
}

struct MatchActor<R: OutcomeReporter> {
    match_id: MatchId,
    engine: MatchEngine,
    senders: HashMap<PlayerId, PlayerSender>,
    reporter: Arc<R>,
    retired: mpsc::UnboundedSender<MatchId>,
    retire_sent: bool,
    join_timeout: Duration,
    receiver: mpsc::Receiver<MatchCommand>,
}

impl<R: OutcomeReporter> MatchActor<R> {
    async fn run(mut self) {
        tracing::info!(match_id = %self.match_id, mode = %self.engine.mode(), "match actor started");

        let deadline = tokio::time::sleep(self.join_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle(cmd).is_break() {
                        break;
                    }
                }
                _ = &mut deadline, if self.engine.phase() == Phase::Waiting => {
                    tracing::info!(match_id = %self.match_id, "join deadline passed, closing match");
                    for player in self.engine.present_players() {
                        self.send_to(player, OpMessage::error("match closed: opponent did not join"));
                    }
                    self.retire();
                    break;
                }
            }
        }

        tracing::info!(match_id = %self.match_id, "match actor stopped");
    }

    fn handle(&mut self, cmd: MatchCommand) -> ControlFlow<()> {
        match cmd {
            MatchCommand::Admit {
                player,
                sender,
                reply,
            } => {
                let result = self.handle_admit(player, sender);
                let _ = reply.send(result);
            }
            MatchCommand::Move {
                player,
                row,
                col,
                reply,
            } => {
                let result = self.handle_move(player, row, col);
                let _ = reply.send(result);
            }
            MatchCommand::Leave { player, reply } => {
                let closed = self.handle_leave(player);
                let _ = reply.send(());
                if closed {
                    return ControlFlow::Break(());
                }
            }
            MatchCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            MatchCommand::Shutdown => {
                tracing::info!(match_id = %self.match_id, "match shutting down");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn handle_admit(&mut self, player: PlayerId, sender: PlayerSender) -> Result<(), MatchError> {
        let effects = self.engine.admit_player(player)?;
        self.senders.insert(player, sender);
        tracing::info!(
            match_id = %self.match_id,
            %player,
            phase = %self.engine.phase(),
            "player admitted"
        );
        self.dispatch(effects);
        Ok(())
    }

    fn handle_move(&mut self, player: PlayerId, row: i32, col: i32) -> Result<(), MatchError> {
        match self.engine.submit_move(player, row, col) {
            Ok(effects) => {
                self.dispatch(effects);
                if self.engine.phase() == Phase::Finished {
                    tracing::info!(
                        match_id = %self.match_id,
                        winner = ?self.engine.winner(),
                        moves = self.engine.move_count(),
                        "match finished"
                    );
                    self.retire();
                }
                Ok(())
            }
            Err(e) => {
                tracing::debug!(match_id = %self.match_id, %player, row, col, error = %e, "move rejected");
                self.send_to(player, OpMessage::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Returns `true` if the match closed as a result.
    fn handle_leave(&mut self, player: PlayerId) -> bool {
        let was = self.engine.phase();
        let had_seat = self.engine.present_players().contains(&player);

        self.senders.remove(&player);
        let effects = self.engine.remove_player(player);
        self.dispatch(effects);

        if !had_seat {
            return false;
        }
        tracing::info!(match_id = %self.match_id, %player, "player left");

        match (was, self.engine.phase()) {
            (Phase::Playing, Phase::Finished) => {
                tracing::info!(match_id = %self.match_id, "match abandoned");
                self.retire();
                false
            }
            (Phase::Waiting, Phase::Waiting) if self.engine.present_players().is_empty() => {
                tracing::info!(match_id = %self.match_id, "waiting match emptied, closing");
                self.retire();
                true
            }
            _ => false,
        }
    }

    fn dispatch(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(Recipient::All, msg) => {
                    for player in self.engine.present_players() {
                        self.send_to(player, msg.clone());
                    }
                }
                Effect::Send(Recipient::Player(player), msg) => self.send_to(player, msg),
                Effect::Report(player, outcome) => {
                    let reporter = Arc::clone(&self.reporter);
                    let match_id = self.match_id;
                    tokio::spawn(async move {
                        if let Err(e) = reporter.report_outcome(match_id, player, outcome).await {
                            tracing::warn!(%match_id, %player, %outcome, error = %e, "outcome report failed");
                        }
                    });
                }
            }
        }
    }

    /// Drops the message if the player's connection is gone.
    fn send_to(&self, player: PlayerId, msg: OpMessage) {
        if let Some(sender) = self.senders.get(&player) {
            if sender.send(msg).is_err() {
                tracing::debug!(match_id = %self.match_id, %player, "outbound channel closed");
            }
        }
    }

    fn retire(&mut self) {
        if !self.retire_sent {
            self.retire_sent = true;
            let _ = self.retired.send(self.match_id);
        }
    }

    fn info(&self) -> MatchInfo {
        MatchInfo {
            match_id: self.match_id,
            mode: self.engine.mode(),
            phase: self.engine.phase(),
            players: self.engine.present_players(),
            state: self.engine.snapshot(),
        }
    }
}

/// Spawns a match actor and returns its handle.
///
/// The actor keeps serving after the match finished (late moves get
/// `MatchNotPlaying`) until every handle is dropped. `retired` receives the
/// match id once, when the match finished or closed.
pub(crate) fn spawn_match<R: OutcomeReporter>(
    match_id: MatchId,
    mode: Mode,
    reporter: Arc<R>,
    retired: mpsc::UnboundedSender<MatchId>,
    join_timeout: Duration,
    channel_size: usize,
) -> MatchHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let actor = MatchActor {
        match_id,
        engine: MatchEngine::new(mode),
        senders: HashMap::new(),
        reporter,
        retired,
        retire_sent: false,
        join_timeout,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    MatchHandle {
        match_id,
        sender: tx,
    }
}
