//! Integration tests for the arena: round scheduling, the delayed advance, and live
//! results flowing into tournament standings.

use std::sync::Arc;
use std::time::Duration;
use swiss_arena::live::InMemoryResultStore;
use swiss_arena::{
    Arena, ArenaConfig, ArenaError, Color, GameResult, Pairing, PlayerId, RoundStatus,
    SessionStatus, Termination, TournamentError, TournamentId, TournamentState,
};

fn arena() -> (Arc<InMemoryResultStore>, Arena) {
    let store = Arc::new(InMemoryResultStore::new());
    let arena = Arena::with_store(ArenaConfig::default(), store.clone());
    (store, arena)
}

async fn started(arena: &Arena, ratings: &[i32]) -> (TournamentId, Vec<Pairing>) {
    let t = arena.create_tournament("scheduler test");
    for (i, rating) in ratings.iter().enumerate() {
        arena
            .register(t.id, PlayerId::new(format!("p{i}")), *rating)
            .await
            .unwrap();
    }
    let pairings = arena.start_tournament(t.id).await.unwrap();
    (t.id, pairings)
}

async fn player_of(arena: &Arena, id: TournamentId, pairing: &Pairing, color: Color) -> PlayerId {
    let t = arena.tournament(id).await.unwrap();
    let participant = match color {
        Color::White => pairing.white,
        Color::Black => pairing.black,
    };
    t.participant(participant).unwrap().player_id.clone()
}

async fn decide_all(arena: &Arena, pairings: &[Pairing]) {
    for p in pairings.iter().filter(|p| !p.is_bye) {
        arena
            .submit_game_result(p.game_id, GameResult::WhiteWin, None)
            .await
            .unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn next_round_starts_after_the_advance_delay() {
    let (_, arena) = arena();
    let (id, round_one) = started(&arena, &[2000, 1900, 1800, 1700]).await;
    assert_eq!(round_one.len(), 2);
    for p in &round_one {
        assert!(arena.coordinator().contains(p.game_id));
    }

    decide_all(&arena, &round_one).await;
    let t = arena.tournament(id).await.unwrap();
    assert_eq!(t.round(1).unwrap().status, RoundStatus::Completed);
    assert_eq!(t.current_round, 1);
    assert_eq!(t.round(2).unwrap().status, RoundStatus::Pending);
    assert!(arena.has_pending_advance(id).await.unwrap());

    tokio::time::sleep(Duration::from_secs(9)).await;
    let t = arena.tournament(id).await.unwrap();
    assert_eq!(t.current_round, 1);
    assert_eq!(t.round(2).unwrap().status, RoundStatus::Pending);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let t = arena.tournament(id).await.unwrap();
    assert_eq!(t.current_round, 2);
    assert_eq!(t.current().unwrap().status, RoundStatus::Active);
    assert!(!arena.has_pending_advance(id).await.unwrap());

    let round_two = arena.current_pairings(id).await.unwrap();
    assert_eq!(round_two.len(), 2);
    for p in &round_two {
        assert!(arena.coordinator().contains(p.game_id));
    }
}

#[tokio::test(start_paused = true)]
async fn force_completion_cancels_the_pending_advance() {
    let (store, arena) = arena();
    let (id, round_one) = started(&arena, &[2000, 1900, 1800, 1700]).await;
    decide_all(&arena, &round_one).await;
    assert!(arena.has_pending_advance(id).await.unwrap());

    let standings = arena.complete_tournament(id).await.unwrap();
    assert_eq!(standings.len(), 4);
    assert!(!arena.has_pending_advance(id).await.unwrap());

    tokio::time::sleep(Duration::from_secs(30)).await;
    let t = arena.tournament(id).await.unwrap();
    assert_eq!(t.state, TournamentState::Completed);
    assert_eq!(t.rounds.len(), 1);

    let settlements = store.settlements();
    assert_eq!(settlements.len(), 1);
    assert_eq!(settlements[0].0, id);
}

#[tokio::test(start_paused = true)]
async fn manual_start_replaces_the_scheduled_advance() {
    let (_, arena) = arena();
    let (id, round_one) = started(&arena, &[2000, 1900, 1800, 1700]).await;
    decide_all(&arena, &round_one).await;

    arena.start_round(id, 2).await.unwrap();
    assert!(!arena.has_pending_advance(id).await.unwrap());

    tokio::time::sleep(Duration::from_secs(15)).await;
    let t = arena.tournament(id).await.unwrap();
    assert_eq!(t.current_round, 2);
    assert_eq!(t.rounds.len(), 2);
}

#[tokio::test]
async fn checkmate_in_a_live_game_scores_the_tournament() {
    let (store, arena) = arena();
    let (id, pairings) = started(&arena, &[2100, 2000]).await;
    assert_eq!(pairings.len(), 1);
    let game = &pairings[0];
    let white = player_of(&arena, id, game, Color::White).await;
    let black = player_of(&arena, id, game, Color::Black).await;

    arena.join_tournament_session(game.game_id, &black).await.unwrap();
    let ack = arena.join_tournament_session(game.game_id, &white).await.unwrap();
    assert_eq!(ack.status, SessionStatus::Active);

    for (uci, mover) in [("f2f3", &white), ("e7e5", &black), ("g2g4", &white)] {
        arena.submit_move(game.game_id, mover, uci).await.unwrap();
    }
    let ack = arena.submit_move(game.game_id, &black, "d8h4").await.unwrap();
    assert_eq!(ack.completed.unwrap().reason, Termination::Checkmate);

    // Single round: the tournament is over and ratings are settled.
    let t = arena.tournament(id).await.unwrap();
    assert_eq!(t.state, TournamentState::Completed);
    let standings = arena.standings(id).await.unwrap();
    assert_eq!(standings[0].player_id, black);
    assert_eq!(standings[0].score, 1.0);
    assert_eq!(standings[1].losses, 1);
    assert_eq!(store.records().len(), 1);
    assert_eq!(store.settlements().len(), 1);

    // A finished tournament no longer routes results for its games.
    assert!(matches!(
        arena
            .submit_game_result(game.game_id, GameResult::Draw, None)
            .await,
        Err(ArenaError::GameNotFound(_))
    ));
}

#[tokio::test]
async fn out_of_band_result_adjudicates_the_live_session() {
    let (store, arena) = arena();
    let (id, pairings) = started(&arena, &[2100, 2000, 1900]).await;
    let game = pairings.iter().find(|p| !p.is_bye).unwrap();
    let bye = pairings.iter().find(|p| p.is_bye).unwrap();
    let black = player_of(&arena, id, game, Color::Black).await;
    let white = player_of(&arena, id, game, Color::White).await;
    arena.join_tournament_session(game.game_id, &white).await.unwrap();

    assert!(matches!(
        arena
            .submit_game_result(game.game_id, GameResult::WhiteWin, Some(black.clone()))
            .await,
        Err(ArenaError::Tournament(TournamentError::WinnerMismatch))
    ));
    assert!(matches!(
        arena
            .submit_game_result(uuid::Uuid::new_v4(), GameResult::Draw, None)
            .await,
        Err(ArenaError::GameNotFound(_))
    ));
    assert!(matches!(
        arena
            .submit_game_result(bye.game_id, GameResult::Draw, None)
            .await,
        Err(ArenaError::Tournament(TournamentError::ResultAlreadyRecorded(_)))
    ));

    arena
        .submit_game_result(game.game_id, GameResult::BlackWin, Some(black.clone()))
        .await
        .unwrap();
    let snapshot = arena.session_snapshot(game.game_id).await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Completed);
    assert_eq!(snapshot.reason, Some(Termination::Adjudication));
    assert_eq!(store.records().len(), 1);

    assert!(matches!(
        arena
            .submit_game_result(game.game_id, GameResult::Draw, None)
            .await,
        Err(ArenaError::Tournament(TournamentError::ResultAlreadyRecorded(_)))
    ));
    // The session is over, so the players cannot end it again.
    assert_eq!(
        arena
            .force_end(game.game_id, &white, Some(Color::White), Termination::Resignation)
            .await
            .unwrap(),
        None
    );
    let standings = arena.standings(id).await.unwrap();
    let black_row = standings.iter().find(|s| s.player_id == black).unwrap();
    assert_eq!(black_row.wins, 1);
}

#[tokio::test]
async fn no_show_forfeit_is_scored() {
    let (_, arena) = arena();
    let (id, pairings) = started(&arena, &[2000, 1900, 1800, 1700]).await;
    let game = &pairings[0];
    let white = player_of(&arena, id, game, Color::White).await;
    arena.join_tournament_session(game.game_id, &white).await.unwrap();

    let later = chrono::Utc::now() + chrono::Duration::hours(1);
    let outcomes = arena.sweep(later).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].reason, Termination::NoShow);

    let t = arena.tournament(id).await.unwrap();
    let pairing = t.current().unwrap().pairing(game.game_id).unwrap();
    assert_eq!(pairing.result, Some(GameResult::WhiteWin));
}

#[tokio::test]
async fn unknown_tournament_is_reported() {
    let (_, arena) = arena();
    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        arena.start_tournament(missing).await,
        Err(ArenaError::TournamentNotFound(_))
    ));
    assert!(matches!(
        arena.standings(missing).await,
        Err(ArenaError::TournamentNotFound(_))
    ));
}
