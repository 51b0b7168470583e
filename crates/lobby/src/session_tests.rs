use super::*;
use chess_rules::{GameStatus, PieceKind, START_FEN};

fn sq(s: &str) -> chess_rules::Square {
    s.parse().unwrap()
}

/// Submission for `uci`, computed on a scratch copy of the relay's game.
fn submission(session: &Session, uci: &str) -> MoveSubmission {
    let mut probe = session.game().clone();
    let record = probe.apply_uci(uci).unwrap();
    MoveSubmission::from_record(&record, probe.status(), probe.to_fen())
}

fn started() -> (Session, PeerId, PeerId) {
    let mut session = Session::new(SessionId::new(), PromotionPolicy::AutoQueen);
    let white = PeerId::new();
    let black = PeerId::new();
    session.join(white);
    session.join(black);
    (session, white, black)
}

fn play(session: &mut Session, white: PeerId, black: PeerId, moves: &[&str]) -> Reply {
    let mut last = Reply::default();
    for mv in moves {
        let peer = if session.game().turn() == Color::White {
            white
        } else {
            black
        };
        let sub = submission(session, mv);
        last = session
            .submit_move(peer, &sub)
            .unwrap_or_else(|e| panic!("{mv} rejected: {e}"));
    }
    last
}

#[test]
fn test_two_joiners_start_and_third_is_refused() {
    let mut session = Session::new(SessionId::new(), PromotionPolicy::AutoQueen);
    let first = PeerId::new();
    let second = PeerId::new();
    let third = PeerId::new();

    let reply = session.join(first);
    assert_eq!(reply.messages_for(first), vec![&ServerMessage::WaitingForPeer]);
    assert_eq!(session.phase(), Phase::WaitingForSecond);

    let reply = session.join(second);
    assert!(reply.started);
    assert_eq!(session.phase(), Phase::Active);
    for peer in [first, second] {
        let msgs = reply.messages_for(peer);
        assert_eq!(msgs.len(), 1);
        let ServerMessage::SessionStart {
            players,
            position,
            you,
        } = msgs[0]
        else {
            panic!("expected session-start");
        };
        assert_eq!(*you, peer);
        assert_eq!(position, START_FEN);
        assert_eq!(
            players.iter().map(|p| p.color).collect::<Vec<_>>(),
            vec![Color::White, Color::Black]
        );
    }
    assert_eq!(session.color_of(first), Some(Color::White));
    assert_eq!(session.color_of(second), Some(Color::Black));

    let reply = session.join(third);
    assert_eq!(reply.messages_for(third), vec![&ServerMessage::LobbyFull]);
    assert_eq!(session.players().len(), 2);
    assert!(!session.has_peer(third));
}

#[test]
fn test_double_join_is_an_error() {
    let mut session = Session::new(SessionId::new(), PromotionPolicy::AutoQueen);
    let peer = PeerId::new();
    session.join(peer);
    let reply = session.join(peer);
    assert!(matches!(
        reply.messages_for(peer)[0],
        ServerMessage::Error { .. }
    ));
    assert_eq!(session.players().len(), 1);
}

#[test]
fn test_move_before_start_is_rejected() {
    let mut session = Session::new(SessionId::new(), PromotionPolicy::AutoQueen);
    let white = PeerId::new();
    session.join(white);
    let sub = submission(&session, "e2e4");
    assert_eq!(
        session.submit_move(white, &sub),
        Err(Rejection::NotStarted)
    );
    assert_eq!(Rejection::NotStarted.notice(), ServerMessage::error("Game not started"));
}

#[test]
fn test_move_is_broadcast_to_both_including_sender() {
    let (mut session, white, black) = started();
    let sub = submission(&session, "e2e4");
    let reply = session.submit_move(white, &sub).unwrap();

    for peer in [white, black] {
        let msgs = reply.messages_for(peer);
        assert_eq!(msgs.len(), 1);
        let ServerMessage::MoveRelayed(relayed) = msgs[0] else {
            panic!("expected move-relayed");
        };
        assert_eq!(relayed.record.from, sq("e2"));
        assert_eq!(relayed.record.to, sq("e4"));
        assert_eq!(relayed.game_status, GameStatus::Active);
        assert_eq!(relayed.position, sub.position);
    }
    assert_eq!(session.game().turn(), Color::Black);
    assert!(reply.teardown.is_none());
}

#[test]
fn test_out_of_turn_and_unknown_peers_are_rejected() {
    let (mut session, white, black) = started();
    let sub = submission(&session, "e2e4");
    let before = session.game().to_fen();

    assert_eq!(session.submit_move(black, &sub), Err(Rejection::NotYourTurn));
    assert_eq!(
        session.submit_move(PeerId::new(), &sub),
        Err(Rejection::UnknownPeer)
    );
    assert_eq!(session.game().to_fen(), before);

    session.submit_move(white, &sub).unwrap();
    assert_eq!(session.submit_move(white, &sub), Err(Rejection::NotYourTurn));
}

#[test]
fn test_illegal_move_is_rejected_despite_peer_claims() {
    let (mut session, white, _black) = started();
    let mut sub = submission(&session, "e2e4");
    sub.to = sq("e5");
    sub.is_checkmate = true;

    let err = session.submit_move(white, &sub).unwrap_err();
    assert!(matches!(err, Rejection::Move(MoveError::Illegal { .. })));
    assert!(matches!(err.notice(), ServerMessage::Error { .. }));
    assert_eq!(session.game().to_fen(), START_FEN);
    assert_eq!(session.phase(), Phase::Active);
}

#[test]
fn test_relay_result_wins_over_claimed_position() {
    let (mut session, white, black) = started();
    let mut sub = submission(&session, "e2e4");
    sub.position = "8/8/8/8/8/8/8/8 w - - 0 1".to_string();

    let reply = session.submit_move(white, &sub).unwrap();
    let ServerMessage::MoveRelayed(relayed) = reply.messages_for(black)[0] else {
        panic!("expected move-relayed");
    };
    assert_eq!(relayed.position, session.game().to_fen());
}

#[test]
fn test_checkmate_ends_session_and_schedules_teardown() {
    let (mut session, white, black) = started();
    let reply = play(
        &mut session,
        white,
        black,
        &["f2f3", "e7e5", "g2g4", "d8h4"],
    );

    assert_eq!(session.phase(), Phase::Ended);
    assert!(reply.ended);
    assert_eq!(reply.teardown, Some(session.epoch()));
    for peer in [white, black] {
        let msgs = reply.messages_for(peer);
        assert_eq!(msgs.len(), 2);
        assert_eq!(
            msgs[1],
            &ServerMessage::SessionEnded(SessionOutcome {
                kind: crate::protocol::OutcomeKind::Checkmate,
                winner_color: Some(Color::Black),
            })
        );
    }

    let fresh = Session::new(SessionId::new(), PromotionPolicy::AutoQueen);
    let sub = submission(&fresh, "a2a3");
    assert_eq!(session.submit_move(white, &sub), Err(Rejection::NotStarted));
}

#[test]
fn test_teardown_resets_and_ignores_stale_epochs() {
    let (mut session, white, black) = started();
    let reply = play(
        &mut session,
        white,
        black,
        &["f2f3", "e7e5", "g2g4", "d8h4"],
    );
    let epoch = reply.teardown.unwrap();

    assert_eq!(session.teardown(epoch + 1), Reply::default());
    assert_eq!(session.phase(), Phase::Ended);

    let reply = session.teardown(epoch);
    assert_eq!(reply.messages_for(white), vec![&ServerMessage::SessionReset]);
    assert_eq!(reply.messages_for(black), vec![&ServerMessage::SessionReset]);
    assert_eq!(session.phase(), Phase::Empty);
    assert!(session.players().is_empty());
    assert_eq!(session.game().to_fen(), START_FEN);

    // The same teardown firing twice does nothing.
    assert_eq!(session.teardown(epoch), Reply::default());
}

#[test]
fn test_teardown_from_old_game_spares_new_game() {
    let (mut session, white, black) = started();
    let reply = play(
        &mut session,
        white,
        black,
        &["f2f3", "e7e5", "g2g4", "d8h4"],
    );
    let old_epoch = reply.teardown.unwrap();

    session.leave(white);
    session.leave(black);
    assert_eq!(session.phase(), Phase::Empty);

    let (a, b) = (PeerId::new(), PeerId::new());
    session.join(a);
    session.join(b);
    assert_eq!(session.phase(), Phase::Active);

    assert_eq!(session.teardown(old_epoch), Reply::default());
    assert_eq!(session.phase(), Phase::Active);
}

#[test]
fn test_peer_leaving_active_game_notifies_other() {
    let (mut session, white, black) = started();
    play(&mut session, white, black, &["e2e4"]);

    let reply = session.leave(white);
    assert_eq!(reply.messages_for(black), vec![&ServerMessage::PeerLeft]);
    assert!(reply.messages_for(white).is_empty());
    assert!(reply.ended);
    assert_eq!(reply.teardown, Some(session.epoch()));
    assert_eq!(session.phase(), Phase::Ended);

    let sub = submission(&session, "e7e5");
    assert_eq!(session.submit_move(black, &sub), Err(Rejection::NotStarted));
}

#[test]
fn test_waiting_peer_leaving_empties_session() {
    let mut session = Session::new(SessionId::new(), PromotionPolicy::AutoQueen);
    let peer = PeerId::new();
    session.join(peer);
    let epoch = session.epoch();

    let reply = session.leave(peer);
    assert!(reply.outbound.is_empty());
    assert_eq!(session.phase(), Phase::Empty);
    assert_eq!(session.epoch(), epoch + 1);

    // Leaving twice is harmless.
    assert_eq!(session.leave(peer), Reply::default());
}

#[test]
fn test_prune_removes_dead_peers_before_admission() {
    let mut session = Session::new(SessionId::new(), PromotionPolicy::AutoQueen);
    let ghost = PeerId::new();
    session.join(ghost);

    session.prune(|id| id != ghost);
    assert_eq!(session.phase(), Phase::Empty);

    let fresh = PeerId::new();
    let reply = session.join(fresh);
    assert_eq!(reply.messages_for(fresh), vec![&ServerMessage::WaitingForPeer]);
    assert_eq!(session.color_of(fresh), Some(Color::White));
}

#[test]
fn test_prompt_choice_surfaces_promotion_notice() {
    let mut session = Session::new(SessionId::new(), PromotionPolicy::PromptChoice);
    let (white, black) = (PeerId::new(), PeerId::new());
    session.join(white);
    session.join(black);
    assert_eq!(session.game().promotion_policy(), PromotionPolicy::PromptChoice);
    play(
        &mut session,
        white,
        black,
        &["b2b4", "a7a5", "b4a5", "b7b6", "a5b6", "h7h6", "b6c7", "h6h5"],
    );

    let mut sub = submission(&session, "c7b8q");
    sub.promoted_to = None;
    let err = session.submit_move(white, &sub).unwrap_err();
    assert_eq!(err, Rejection::Move(MoveError::PromotionRequired));
    assert_eq!(err.notice(), ServerMessage::PromotionRequired);

    sub.promoted_to = Some(PieceKind::Knight);
    let reply = session.submit_move(white, &sub).unwrap();
    let ServerMessage::MoveRelayed(relayed) = reply.messages_for(black)[0] else {
        panic!("expected move-relayed");
    };
    assert_eq!(relayed.record.promoted_to, Some(PieceKind::Knight));
}

#[test]
fn test_expire_resets_active_session() {
    let (mut session, white, black) = started();
    let reply = session.expire();
    assert!(reply.ended);
    assert_eq!(reply.messages_for(white), vec![&ServerMessage::SessionReset]);
    assert_eq!(reply.messages_for(black), vec![&ServerMessage::SessionReset]);
    assert_eq!(session.phase(), Phase::Empty);
}

#[test]
fn test_idle_time_grows_and_touch_resets_it() {
    let mut session = Session::new(SessionId::new(), PromotionPolicy::AutoQueen);
    let later = Instant::now() + Duration::from_secs(60);
    assert!(session.idle_for(later) >= Duration::from_secs(59));
    session.touch();
    assert!(session.idle_for(Instant::now()) < Duration::from_secs(1));
}
