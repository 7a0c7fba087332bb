//! Match registry scenarios driven through the public API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossmark_match::{
    MatchConfig, MatchError, MatchRegistry, Outcome, OutcomeReporter, ReportError,
};
use crossmark_protocol::{MatchId, Mode, OpMessage, Phase, PlayerId, Symbol};
use tokio::sync::mpsc;

/// Records every report it receives.
#[derive(Default)]
struct RecordingReporter {
    reports: Mutex<Vec<(MatchId, PlayerId, Outcome)>>,
}

impl RecordingReporter {
    fn reports(&self) -> Vec<(PlayerId, Outcome)> {
        let mut r: Vec<(PlayerId, Outcome)> = self
            .reports
            .lock()
            .unwrap()
            .iter()
            .map(|(_, p, o)| (*p, *o))
            .collect();
        r.sort_by_key(|(p, _)| *p);
        r
    }
}

impl OutcomeReporter for RecordingReporter {
    async fn report_outcome(
        &self,
        match_id: MatchId,
        player: PlayerId,
        outcome: Outcome,
    ) -> Result<(), ReportError> {
        self.reports.lock().unwrap().push((match_id, player, outcome));
        Ok(())
    }
}

/// Always fails.
struct FailingReporter;

impl OutcomeReporter for FailingReporter {
    async fn report_outcome(
        &self,
        _match_id: MatchId,
        _player: PlayerId,
        _outcome: Outcome,
    ) -> Result<(), ReportError> {
        Err(ReportError::Unavailable("score store offline".into()))
    }
}

fn pid(n: u64) -> PlayerId {
    PlayerId(n)
}

type Inbox = mpsc::UnboundedReceiver<OpMessage>;

async fn start_match<R: OutcomeReporter>(
    reg: &MatchRegistry<R>,
    mode: Mode,
) -> (MatchId, Inbox, Inbox) {
    let match_id = reg.create_match(mode).unwrap();
    let (tx1, rx1) = mpsc::unbounded_channel();
    let (tx2, rx2) = mpsc::unbounded_channel();
    reg.admit(match_id, pid(1), tx1).await.unwrap();
    reg.admit(match_id, pid(2), tx2).await.unwrap();
    (match_id, rx1, rx2)
}

fn drain(rx: &mut Inbox) -> Vec<OpMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

#[tokio::test]
async fn test_full_game_win_reports_once_and_retires() {
    let reporter = Arc::new(RecordingReporter::default());
    let reg = MatchRegistry::new(MatchConfig::default(), Arc::clone(&reporter));
    let (match_id, mut rx1, mut rx2) = start_match(&reg, Mode::Classic).await;

    for (p, r, c) in [(1, 0, 0), (2, 1, 0), (1, 0, 1), (2, 1, 1), (1, 0, 2)] {
        reg.submit_move(pid(p), r, c).await.unwrap();
    }

    // Opening state plus one state per move.
    let seen1 = drain(&mut rx1);
    let seen2 = drain(&mut rx2);
    assert_eq!(seen1.len(), 6);
    assert_eq!(seen1, seen2);
    let OpMessage::State(last) = seen1.last().unwrap() else {
        panic!("expected a STATE message");
    };
    assert_eq!(last.winner, Some(Symbol::X));
    assert_eq!(last.phase, Phase::Finished);

    assert_eq!(reg.match_count(), 0, "finished match should be retired");
    assert!(reg.player_match(pid(1)).is_none());
    assert!(matches!(reg.info(match_id).await, Err(MatchError::NotFound(_))));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        reporter.reports(),
        vec![(pid(1), Outcome::Win), (pid(2), Outcome::Loss)]
    );
}

#[tokio::test]
async fn test_draw_reports_draw_for_both() {
    let reporter = Arc::new(RecordingReporter::default());
    let reg = MatchRegistry::new(MatchConfig::default(), Arc::clone(&reporter));
    let (_, _rx1, _rx2) = start_match(&reg, Mode::Classic).await;

    let moves = [
        (1, 0, 0),
        (2, 0, 1),
        (1, 0, 2),
        (2, 1, 1),
        (1, 1, 0),
        (2, 1, 2),
        (1, 2, 1),
        (2, 2, 0),
        (1, 2, 2),
    ];
    for (p, r, c) in moves {
        reg.submit_move(pid(p), r, c).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        reporter.reports(),
        vec![(pid(1), Outcome::Draw), (pid(2), Outcome::Draw)]
    );
}

#[tokio::test]
async fn test_leave_mid_game_abandons_for_remaining_player() {
    let reporter = Arc::new(RecordingReporter::default());
    let reg = MatchRegistry::new(MatchConfig::default(), Arc::clone(&reporter));
    let (match_id, _rx1, mut rx2) = start_match(&reg, Mode::Advanced).await;
    reg.submit_move(pid(1), 2, 2).await.unwrap();
    drain(&mut rx2);

    assert_eq!(reg.leave(pid(1)).await, Some(match_id));

    let msgs = drain(&mut rx2);
    assert!(matches!(msgs.as_slice(), [OpMessage::State(s)] if s.phase == Phase::Finished));
    assert_eq!(reg.match_count(), 0);
    assert_eq!(
        reg.submit_move(pid(2), 0, 0).await,
        Err(MatchError::NoActiveMatch(pid(2)))
    );

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(reporter.reports(), vec![(pid(2), Outcome::Abandoned)]);
}

#[tokio::test]
async fn test_one_match_per_player() {
    let reg = MatchRegistry::new(MatchConfig::default(), Arc::new(RecordingReporter::default()));
    let first = reg.create_match(Mode::Classic).unwrap();
    let second = reg.create_match(Mode::Classic).unwrap();

    let (tx, _rx) = mpsc::unbounded_channel();
    reg.admit(first, pid(1), tx.clone()).await.unwrap();
    assert_eq!(
        reg.admit(second, pid(1), tx).await,
        Err(MatchError::AlreadyInMatch(pid(1)))
    );
    assert_eq!(reg.player_match(pid(1)), Some(first));
}

#[tokio::test]
async fn test_players_can_play_again_after_finish() {
    let reg = MatchRegistry::new(MatchConfig::default(), Arc::new(RecordingReporter::default()));
    let (_, _a, _b) = start_match(&reg, Mode::Classic).await;
    reg.leave(pid(2)).await;
    assert!(reg.player_match(pid(1)).is_none());

    let (_, _c, _d) = start_match(&reg, Mode::Classic).await;
    assert_eq!(reg.match_count(), 1);
}

#[tokio::test]
async fn test_failing_reporter_does_not_affect_match() {
    let reg = MatchRegistry::new(MatchConfig::default(), Arc::new(FailingReporter));
    let (_, mut rx1, _rx2) = start_match(&reg, Mode::Classic).await;

    for (p, r, c) in [(1, 0, 0), (2, 1, 0), (1, 1, 1), (2, 2, 0), (1, 2, 2)] {
        reg.submit_move(pid(p), r, c).await.unwrap();
    }

    let OpMessage::State(last) = drain(&mut rx1).pop().unwrap() else {
        panic!("expected a STATE message");
    };
    assert_eq!(last.winner, Some(Symbol::X));
    assert_eq!(reg.match_count(), 0);
}

#[tokio::test]
async fn test_matches_are_isolated() {
    let reg = MatchRegistry::new(MatchConfig::default(), Arc::new(RecordingReporter::default()));
    let (a, _, _) = start_match(&reg, Mode::Classic).await;

    let b = reg.create_match(Mode::Classic).unwrap();
    let (tx3, _rx3) = mpsc::unbounded_channel();
    let (tx4, _rx4) = mpsc::unbounded_channel();
    reg.admit(b, pid(3), tx3).await.unwrap();
    reg.admit(b, pid(4), tx4).await.unwrap();

    reg.submit_move(pid(1), 0, 0).await.unwrap();
    reg.submit_move(pid(3), 2, 2).await.unwrap();

    let info_a = reg.info(a).await.unwrap();
    let info_b = reg.info(b).await.unwrap();
    assert!(info_a.state.board[2][2].is_empty());
    assert!(info_b.state.board[0][0].is_empty());
    assert_eq!(info_a.state.turn, Symbol::O);
    assert_eq!(info_b.state.turn, Symbol::O);
}

#[tokio::test]
async fn test_shutdown_stops_all_matches() {
    let reg = MatchRegistry::new(MatchConfig::default(), Arc::new(RecordingReporter::default()));
    let (a, _, _) = start_match(&reg, Mode::Classic).await;
    reg.shutdown().await;

    assert_eq!(reg.match_count(), 0);
    assert!(matches!(reg.info(a).await, Err(MatchError::NotFound(_))));
}
