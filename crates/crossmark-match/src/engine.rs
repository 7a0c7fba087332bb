//! The match state machine.
//!
//! [`MatchEngine`] owns one match's board, seats and lifecycle. It does no
//! I/O: every mutating call returns the [`Effect`]s the caller must carry
//! out (messages to send, outcomes to report) once the state change has
//! been committed. A rejected call returns an error and leaves the engine
//! exactly as it was.

use std::collections::BTreeMap;

use crossmark_protocol::{Cell, Mode, OpMessage, Phase, PlayerId, StatePayload, Symbol};

use crate::{MatchError, Outcome};

/// Who an outbound message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every player still present in the match.
    All,
    Player(PlayerId),
}

/// Something the engine wants done after a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send(Recipient, OpMessage),
    Report(PlayerId, Outcome),
}

#[derive(Debug, Clone, Copy)]
struct Seat {
    player: PlayerId,
    symbol: Symbol,
    present: bool,
}

/// One match of tic-tac-toe.
#[derive(Debug, Clone)]
pub struct MatchEngine {
    mode: Mode,
    size: usize,
    board: Vec<Vec<Cell>>,
    /// Join order. Never more than two.
    seats: Vec<Seat>,
    turn: Symbol,
    move_count: usize,
    phase: Phase,
    winner: Option<Symbol>,
    abandoned: bool,
    reported: bool,
}

impl MatchEngine {
    pub fn new(mode: Mode) -> Self {
        let size = mode.board_size();
        Self {
            mode,
            size,
            board: vec![vec![Cell::Empty; size]; size],
            seats: Vec::with_capacity(2),
            turn: Symbol::X,
            move_count: 0,
            phase: Phase::Waiting,
            winner: None,
            abandoned: false,
            reported: false,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn turn(&self) -> Symbol {
        self.turn
    }

    pub fn winner(&self) -> Option<Symbol> {
        self.winner
    }

    pub fn move_count(&self) -> usize {
        self.move_count
    }

    /// `true` once the match finished because a player left.
    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        self.board.get(row).and_then(|r| r.get(col)).copied()
    }

    pub fn symbol_of(&self, player: PlayerId) -> Option<Symbol> {
        self.seats
            .iter()
            .find(|s| s.player == player)
            .map(|s| s.symbol)
    }

    /// Players still connected to the match, in join order.
    pub fn present_players(&self) -> Vec<PlayerId> {
        self.seats
            .iter()
            .filter(|s| s.present)
            .map(|s| s.player)
            .collect()
    }

    /// Admits a player. The first seat gets X, the second O; the second
    /// admission starts the match and broadcasts the opening state.
    pub fn admit_player(&mut self, player: PlayerId) -> Result<Vec<Effect>, MatchError> {
        if self.phase == Phase::Finished {
            return Err(MatchError::MatchFinished);
        }
        if self.seats.iter().any(|s| s.player == player) {
            return Err(MatchError::AlreadyInMatch(player));
        }
        if self.seats.len() >= 2 {
            return Err(MatchError::MatchFull);
        }

        let symbol = if self.seats.is_empty() {
            Symbol::X
        } else {
            Symbol::O
        };
        self.seats.push(Seat {
            player,
            symbol,
            present: true,
        });

        if self.seats.len() < 2 {
            return Ok(Vec::new());
        }

        self.phase = Phase::Playing;
        self.turn = Symbol::X;
        Ok(vec![self.broadcast_state()])
    }

    /// Applies a move by `player` at (`row`, `col`).
    ///
    /// Checks, in order: the match is playing, the player is seated, the
    /// coordinates are on the board, it is the player's turn, the cell is
    /// empty. On success the updated state goes to everyone, including on
    /// the finishing move, followed by the outcome reports.
    pub fn submit_move(
        &mut self,
        player: PlayerId,
        row: i32,
        col: i32,
    ) -> Result<Vec<Effect>, MatchError> {
        if self.phase != Phase::Playing {
            return Err(MatchError::MatchNotPlaying);
        }
        let symbol = self
            .seats
            .iter()
            .find(|s| s.player == player && s.present)
            .map(|s| s.symbol)
            .ok_or(MatchError::NotInMatch(player))?;

        let (r, c) = self.checked_coordinates(row, col)?;
        if symbol != self.turn {
            return Err(MatchError::NotYourTurn);
        }
        if !self.board[r][c].is_empty() {
            return Err(MatchError::CellOccupied { row: r, col: c });
        }

        self.board[r][c] = Cell::Marked(symbol);
        self.move_count += 1;

        if let Some(winner) = self.check_winner() {
            self.winner = Some(winner);
            self.phase = Phase::Finished;
        } else if self.move_count == self.size * self.size {
            self.phase = Phase::Finished;
        } else {
            self.turn = self.turn.other();
        }

        let mut effects = vec![self.broadcast_state()];
        if self.phase == Phase::Finished {
            effects.extend(self.take_reports());
        }
        Ok(effects)
    }

    /// Removes a player. Never fails.
    ///
    /// While waiting the seat is simply freed. During play the match ends
    /// as abandoned: the remaining player gets the final state and an
    /// [`Outcome::Abandoned`] report. Once finished, or for a player that
    /// isn't seated, nothing happens.
    pub fn remove_player(&mut self, player: PlayerId) -> Vec<Effect> {
        match self.phase {
            Phase::Waiting => {
                self.seats.retain(|s| s.player != player);
                Vec::new()
            }
            Phase::Playing => {
                let Some(seat) = self
                    .seats
                    .iter_mut()
                    .find(|s| s.player == player && s.present)
                else {
                    return Vec::new();
                };
                seat.present = false;
                self.phase = Phase::Finished;
                self.abandoned = true;

                let mut effects = vec![self.broadcast_state()];
                effects.extend(self.take_reports());
                effects
            }
            Phase::Finished => {
                if let Some(seat) = self.seats.iter_mut().find(|s| s.player == player) {
                    seat.present = false;
                }
                Vec::new()
            }
        }
    }

    /// Full snapshot as sent in `STATE`.
    pub fn snapshot(&self) -> StatePayload {
        StatePayload {
            board: self.board.clone(),
            turn: self.turn,
            winner: self.winner,
            size: self.size,
            mode: self.mode,
            phase: self.phase,
            players: self
                .seats
                .iter()
                .map(|s| (s.player, s.symbol))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn broadcast_state(&self) -> Effect {
        Effect::Send(Recipient::All, OpMessage::State(self.snapshot()))
    }

    fn checked_coordinates(&self, row: i32, col: i32) -> Result<(usize, usize), MatchError> {
        let invalid = MatchError::InvalidCoordinates {
            row,
            col,
            size: self.size,
        };
        let r = usize::try_from(row).map_err(|_| invalid.clone())?;
        let c = usize::try_from(col).map_err(|_| invalid.clone())?;
        if r >= self.size || c >= self.size {
            return Err(invalid);
        }
        Ok((r, c))
    }

    /// Outcome reports for the terminal transition. Empty after the first
    /// call.
    fn take_reports(&mut self) -> Vec<Effect> {
        if self.reported {
            return Vec::new();
        }
        self.reported = true;

        if self.abandoned {
            return self
                .seats
                .iter()
                .filter(|s| s.present)
                .map(|s| Effect::Report(s.player, Outcome::Abandoned))
                .collect();
        }

        self.seats
            .iter()
            .map(|s| {
                let outcome = match self.winner {
                    Some(w) if w == s.symbol => Outcome::Win,
                    Some(_) => Outcome::Loss,
                    None => Outcome::Draw,
                };
                Effect::Report(s.player, outcome)
            })
            .collect()
    }

    /// Rows, then columns, then the main diagonal, then the anti-diagonal.
    fn check_winner(&self) -> Option<Symbol> {
        let n = self.size;
        let b = &self.board;

        (0..n)
            .find_map(|r| line_winner((0..n).map(|c| b[r][c])))
            .or_else(|| (0..n).find_map(|c| line_winner((0..n).map(|r| b[r][c]))))
            .or_else(|| line_winner((0..n).map(|i| b[i][i])))
            .or_else(|| line_winner((0..n).map(|i| b[i][n - 1 - i])))
    }
}

/// The symbol filling every cell of a line, if any.
fn line_winner(mut cells: impl Iterator<Item = Cell>) -> Option<Symbol> {
    let first = cells.next()?;
    let Cell::Marked(symbol) = first else {
        return None;
    };
    cells.all(|c| c == first).then_some(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u64) -> PlayerId {
        PlayerId(n)
    }

    /// A classic match with P-1 as X and P-2 as O, already playing.
    fn playing(mode: Mode) -> MatchEngine {
        let mut engine = MatchEngine::new(mode);
        engine.admit_player(pid(1)).unwrap();
        engine.admit_player(pid(2)).unwrap();
        engine
    }

    fn reports(effects: &[Effect]) -> Vec<(PlayerId, Outcome)> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Report(p, o) => Some((*p, *o)),
                _ => None,
            })
            .collect()
    }

    fn last_state(effects: &[Effect]) -> StatePayload {
        effects
            .iter()
            .rev()
            .find_map(|e| match e {
                Effect::Send(Recipient::All, OpMessage::State(s)) => Some(s.clone()),
                _ => None,
            })
            .expect("effects should contain a state broadcast")
    }

    #[test]
    fn test_new_sizes_board_from_mode() {
        let classic = MatchEngine::new(Mode::Classic);
        assert_eq!(classic.size(), 3);
        assert_eq!(classic.phase(), Phase::Waiting);

        let advanced = MatchEngine::new(Mode::Advanced);
        assert_eq!(advanced.size(), 5);
        assert_eq!(advanced.snapshot().board.len(), 5);
        assert!(advanced.snapshot().board.iter().all(|r| r.len() == 5));
    }

    #[test]
    fn test_admit_player_first_waits_second_starts() {
        let mut engine = MatchEngine::new(Mode::Classic);

        let effects = engine.admit_player(pid(7)).unwrap();
        assert!(effects.is_empty());
        assert_eq!(engine.phase(), Phase::Waiting);

        let effects = engine.admit_player(pid(3)).unwrap();
        assert_eq!(engine.phase(), Phase::Playing);
        assert_eq!(engine.symbol_of(pid(7)), Some(Symbol::X));
        assert_eq!(engine.symbol_of(pid(3)), Some(Symbol::O));

        let state = last_state(&effects);
        assert_eq!(state.turn, Symbol::X);
        assert!(state.board.iter().flatten().all(|c| c.is_empty()));
        assert_eq!(state.players.len(), 2);
        assert_eq!(state.phase, Phase::Playing);
    }

    #[test]
    fn test_admit_player_full() {
        let mut engine = playing(Mode::Classic);
        assert_eq!(engine.admit_player(pid(3)), Err(MatchError::MatchFull));
    }

    #[test]
    fn test_admit_player_twice() {
        let mut engine = MatchEngine::new(Mode::Classic);
        engine.admit_player(pid(1)).unwrap();
        assert_eq!(
            engine.admit_player(pid(1)),
            Err(MatchError::AlreadyInMatch(pid(1)))
        );
    }

    #[test]
    fn test_admit_player_after_finish() {
        let mut engine = playing(Mode::Classic);
        engine.remove_player(pid(2));
        assert_eq!(engine.admit_player(pid(3)), Err(MatchError::MatchFinished));
    }

    #[test]
    fn test_submit_move_updates_cell_turn_and_count() {
        let mut engine = playing(Mode::Classic);

        let effects = engine.submit_move(pid(1), 1, 2).unwrap();

        assert_eq!(engine.cell(1, 2), Some(Cell::Marked(Symbol::X)));
        assert_eq!(engine.turn(), Symbol::O);
        assert_eq!(engine.move_count(), 1);
        let filled = engine.snapshot().board.iter().flatten().filter(|c| !c.is_empty()).count();
        assert_eq!(filled, 1);

        assert_eq!(effects.len(), 1);
        assert!(reports(&effects).is_empty());
    }

    #[test]
    fn test_submit_move_out_of_bounds() {
        let mut engine = playing(Mode::Classic);
        let before = engine.snapshot();

        for (row, col) in [(-1, 0), (0, -1), (3, 0), (0, 3), (i32::MAX, i32::MIN)] {
            let err = engine.submit_move(pid(1), row, col).unwrap_err();
            assert!(matches!(err, MatchError::InvalidCoordinates { .. }));
        }
        assert_eq!(engine.snapshot(), before);
        assert_eq!(engine.move_count(), 0);
    }

    #[test]
    fn test_submit_move_advanced_accepts_wider_board() {
        let mut engine = playing(Mode::Advanced);
        engine.submit_move(pid(1), 4, 4).unwrap();
        assert_eq!(engine.cell(4, 4), Some(Cell::Marked(Symbol::X)));
        assert!(matches!(
            engine.submit_move(pid(2), 5, 0),
            Err(MatchError::InvalidCoordinates { size: 5, .. })
        ));
    }

    #[test]
    fn test_submit_move_not_your_turn() {
        let mut engine = playing(Mode::Classic);
        assert_eq!(engine.submit_move(pid(2), 0, 0), Err(MatchError::NotYourTurn));
        assert_eq!(engine.move_count(), 0);
    }

    #[test]
    fn test_submit_move_occupied_cell_unchanged() {
        let mut engine = playing(Mode::Classic);
        engine.submit_move(pid(1), 0, 0).unwrap();

        let before = engine.snapshot();
        assert_eq!(
            engine.submit_move(pid(2), 0, 0),
            Err(MatchError::CellOccupied { row: 0, col: 0 })
        );
        assert_eq!(engine.snapshot(), before);

        // Wrong turn on an occupied cell: still untouched.
        assert!(engine.submit_move(pid(1), 0, 0).is_err());
        assert_eq!(engine.cell(0, 0), Some(Cell::Marked(Symbol::X)));
    }

    #[test]
    fn test_submit_move_waiting_rejected() {
        let mut engine = MatchEngine::new(Mode::Classic);
        engine.admit_player(pid(1)).unwrap();
        assert_eq!(
            engine.submit_move(pid(1), 0, 0),
            Err(MatchError::MatchNotPlaying)
        );
    }

    #[test]
    fn test_submit_move_from_outsider() {
        let mut engine = playing(Mode::Classic);
        assert_eq!(
            engine.submit_move(pid(9), 0, 0),
            Err(MatchError::NotInMatch(pid(9)))
        );
    }

    #[test]
    fn test_submit_move_row_win() {
        let mut engine = playing(Mode::Classic);
        engine.submit_move(pid(1), 0, 0).unwrap();
        engine.submit_move(pid(2), 1, 0).unwrap();
        engine.submit_move(pid(1), 0, 1).unwrap();
        engine.submit_move(pid(2), 1, 1).unwrap();
        let effects = engine.submit_move(pid(1), 0, 2).unwrap();

        assert_eq!(engine.winner(), Some(Symbol::X));
        assert_eq!(engine.phase(), Phase::Finished);

        let state = last_state(&effects);
        assert_eq!(state.winner, Some(Symbol::X));
        assert_eq!(state.board[0][2], Cell::Marked(Symbol::X));
        assert_eq!(
            reports(&effects),
            vec![(pid(1), Outcome::Win), (pid(2), Outcome::Loss)]
        );
    }

    #[test]
    fn test_submit_move_column_win_for_o() {
        let mut engine = playing(Mode::Classic);
        engine.submit_move(pid(1), 0, 0).unwrap();
        engine.submit_move(pid(2), 0, 2).unwrap();
        engine.submit_move(pid(1), 1, 0).unwrap();
        engine.submit_move(pid(2), 1, 2).unwrap();
        engine.submit_move(pid(1), 2, 1).unwrap();
        let effects = engine.submit_move(pid(2), 2, 2).unwrap();

        assert_eq!(engine.winner(), Some(Symbol::O));
        assert_eq!(
            reports(&effects),
            vec![(pid(1), Outcome::Loss), (pid(2), Outcome::Win)]
        );
    }

    #[test]
    fn test_submit_move_anti_diagonal_win() {
        let mut engine = playing(Mode::Classic);
        engine.submit_move(pid(1), 0, 2).unwrap();
        engine.submit_move(pid(2), 0, 0).unwrap();
        engine.submit_move(pid(1), 1, 1).unwrap();
        engine.submit_move(pid(2), 0, 1).unwrap();
        engine.submit_move(pid(1), 2, 0).unwrap();
        assert_eq!(engine.winner(), Some(Symbol::X));
    }

    #[test]
    fn test_submit_move_advanced_diagonal_win() {
        let mut engine = playing(Mode::Advanced);
        let o_moves = [(0, 4), (1, 3), (2, 1), (3, 1)];
        for (i, (r, c)) in o_moves.into_iter().enumerate() {
            engine.submit_move(pid(1), i as i32, i as i32).unwrap();
            engine.submit_move(pid(2), r, c).unwrap();
        }
        assert_eq!(engine.phase(), Phase::Playing);
        engine.submit_move(pid(1), 4, 4).unwrap();
        assert_eq!(engine.winner(), Some(Symbol::X));
    }

    #[test]
    fn test_submit_move_draw() {
        // X O X
        // X O O
        // O X X
        let mut engine = playing(Mode::Classic);
        let moves = [
            (pid(1), 0, 0),
            (pid(2), 0, 1),
            (pid(1), 0, 2),
            (pid(2), 1, 1),
            (pid(1), 1, 0),
            (pid(2), 1, 2),
            (pid(1), 2, 1),
            (pid(2), 2, 0),
        ];
        for (p, r, c) in moves {
            let effects = engine.submit_move(p, r, c).unwrap();
            assert!(reports(&effects).is_empty());
        }
        let effects = engine.submit_move(pid(1), 2, 2).unwrap();

        assert_eq!(engine.phase(), Phase::Finished);
        assert_eq!(engine.winner(), None);
        assert_eq!(engine.move_count(), 9);
        assert_eq!(last_state(&effects).winner, None);
        assert_eq!(
            reports(&effects),
            vec![(pid(1), Outcome::Draw), (pid(2), Outcome::Draw)]
        );
    }

    #[test]
    fn test_submit_move_after_finish_rejected() {
        let mut engine = playing(Mode::Classic);
        engine.submit_move(pid(1), 0, 0).unwrap();
        engine.submit_move(pid(2), 1, 0).unwrap();
        engine.submit_move(pid(1), 0, 1).unwrap();
        engine.submit_move(pid(2), 1, 1).unwrap();
        engine.submit_move(pid(1), 0, 2).unwrap();

        assert_eq!(
            engine.submit_move(pid(2), 2, 2),
            Err(MatchError::MatchNotPlaying)
        );
    }

    #[test]
    fn test_remove_player_during_play_abandons() {
        let mut engine = playing(Mode::Classic);
        engine.submit_move(pid(1), 0, 0).unwrap();

        let effects = engine.remove_player(pid(1));

        assert_eq!(engine.phase(), Phase::Finished);
        assert!(engine.is_abandoned());
        assert_eq!(engine.winner(), None);
        assert_eq!(reports(&effects), vec![(pid(2), Outcome::Abandoned)]);
        assert_eq!(engine.present_players(), vec![pid(2)]);
        assert_eq!(
            engine.submit_move(pid(2), 1, 1),
            Err(MatchError::MatchNotPlaying)
        );
    }

    #[test]
    fn test_remove_player_reports_once() {
        let mut engine = playing(Mode::Classic);
        let first = engine.remove_player(pid(1));
        let second = engine.remove_player(pid(2));
        let again = engine.remove_player(pid(1));

        assert_eq!(reports(&first).len(), 1);
        assert!(second.is_empty());
        assert!(again.is_empty());
    }

    #[test]
    fn test_remove_player_after_win_no_extra_report() {
        let mut engine = playing(Mode::Classic);
        engine.submit_move(pid(1), 0, 0).unwrap();
        engine.submit_move(pid(2), 1, 0).unwrap();
        engine.submit_move(pid(1), 0, 1).unwrap();
        engine.submit_move(pid(2), 1, 1).unwrap();
        engine.submit_move(pid(1), 0, 2).unwrap();

        assert!(engine.remove_player(pid(2)).is_empty());
        assert!(!engine.is_abandoned());
    }

    #[test]
    fn test_remove_player_waiting_frees_slot() {
        let mut engine = MatchEngine::new(Mode::Classic);
        engine.admit_player(pid(1)).unwrap();

        assert!(engine.remove_player(pid(1)).is_empty());
        assert_eq!(engine.phase(), Phase::Waiting);
        assert!(engine.present_players().is_empty());

        engine.admit_player(pid(2)).unwrap();
        engine.admit_player(pid(3)).unwrap();
        assert_eq!(engine.symbol_of(pid(2)), Some(Symbol::X));
        assert_eq!(engine.phase(), Phase::Playing);
    }

    #[test]
    fn test_remove_player_unknown_is_noop() {
        let mut engine = playing(Mode::Classic);
        assert!(engine.remove_player(pid(42)).is_empty());
        assert_eq!(engine.phase(), Phase::Playing);
    }

    #[test]
    fn test_snapshot_serializes_wire_shape() {
        let mut engine = playing(Mode::Classic);
        engine.submit_move(pid(1), 0, 0).unwrap();

        let json = serde_json::to_value(engine.snapshot()).unwrap();
        assert_eq!(json["board"][0][0], "X");
        assert_eq!(json["board"][0][1], "");
        assert_eq!(json["turn"], "O");
        assert_eq!(json["size"], 3);
        assert_eq!(json["mode"], "classic");
        assert_eq!(json["players"]["1"], "X");
        assert_eq!(json["players"]["2"], "O");
        assert!(json.get("winner").is_none());
    }
}
