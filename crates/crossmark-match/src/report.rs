//! Outcome reporting: the boundary to whatever keeps score.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use crossmark_protocol::{MatchId, PlayerId};
use serde::{Deserialize, Serialize};

/// Terminal per-player result of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    Draw,
    /// The opponent left before the match finished on the board.
    Abandoned,
}

impl Outcome {
    /// Score change applied by the [`Scoreboard`].
    pub fn score_delta(self) -> i64 {
        match self {
            Self::Win => 10,
            Self::Loss => -5,
            Self::Draw => 1,
            Self::Abandoned => 0,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win => write!(f, "win"),
            Self::Loss => write!(f, "loss"),
            Self::Draw => write!(f, "draw"),
            Self::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Failure from an [`OutcomeReporter`]. Logged, never retried.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("score store unavailable: {0}")]
    Unavailable(String),
}

/// Receives the terminal outcome of every player of every match.
///
/// Called at most once per player per match, on a spawned task. A slow or
/// failing reporter never holds up the match that produced the outcome.
pub trait OutcomeReporter: Send + Sync + 'static {
    fn report_outcome(
        &self,
        match_id: MatchId,
        player: PlayerId,
        outcome: Outcome,
    ) -> impl std::future::Future<Output = Result<(), ReportError>> + Send;
}

/// Accumulated results for one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub score: i64,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub abandoned: u32,
}

impl ScoreRecord {
    fn apply(&mut self, outcome: Outcome) {
        self.score += outcome.score_delta();
        match outcome {
            Outcome::Win => self.wins += 1,
            Outcome::Loss => self.losses += 1,
            Outcome::Draw => self.draws += 1,
            Outcome::Abandoned => self.abandoned += 1,
        }
    }
}

/// In-memory leaderboard. Win +10, loss −5, draw +1, abandoned 0.
#[derive(Debug, Default)]
pub struct Scoreboard {
    records: Mutex<HashMap<PlayerId, ScoreRecord>>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, player: PlayerId) -> Option<ScoreRecord> {
        self.lock().get(&player).copied()
    }

    /// Top `limit` players by score, ties broken by player id.
    pub fn ranking(&self, limit: usize) -> Vec<(PlayerId, ScoreRecord)> {
        let mut all: Vec<(PlayerId, ScoreRecord)> =
            self.lock().iter().map(|(p, r)| (*p, *r)).collect();
        all.sort_by(|a, b| b.1.score.cmp(&a.1.score).then(a.0.cmp(&b.0)));
        all.truncate(limit);
        all
    }

    fn apply(&self, player: PlayerId, outcome: Outcome) {
        self.lock().entry(player).or_default().apply(outcome);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PlayerId, ScoreRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl OutcomeReporter for Scoreboard {
    async fn report_outcome(
        &self,
        match_id: MatchId,
        player: PlayerId,
        outcome: Outcome,
    ) -> Result<(), ReportError> {
        self.apply(player, outcome);
        tracing::debug!(%match_id, %player, %outcome, "score recorded");
        Ok(())
    }
}
