//! Integration tests for registration, result aggregation and the round lifecycle.

use swiss_arena::logic::{
    apply_result, complete_round, complete_tournament, import_roster_csv, is_round_complete,
    is_tournament_complete, register_participant, standings, start_round, start_tournament,
    RoundCompletion,
};
use swiss_arena::{GameResult, PlayerId, RoundStatus, Tournament, TournamentError, TournamentState};

fn started(ratings: &[i32]) -> Tournament {
    let mut t = Tournament::new("results test");
    for (i, rating) in ratings.iter().enumerate() {
        register_participant(&mut t, PlayerId::new(format!("p{i}")), *rating).unwrap();
    }
    start_tournament(&mut t).unwrap();
    t
}

fn total_score(t: &Tournament) -> f64 {
    t.participants.iter().map(|p| p.score).sum()
}

fn assert_tiebreaks_consistent(t: &Tournament) {
    for p in &t.participants {
        let mut buchholz = 0.0;
        let mut sb = 0.0;
        for g in &p.games {
            let opp = t.participant(g.opponent).unwrap();
            buchholz += opp.score;
            sb += g.own_score * opp.score;
        }
        assert_eq!(p.buchholz, buchholz, "{} buchholz", p.player_id);
        assert_eq!(p.sonneborn_berger, sb, "{} sonneborn-berger", p.player_id);
    }
}

#[test]
fn start_requires_two_participants() {
    let mut t = Tournament::new("tiny");
    register_participant(&mut t, PlayerId::new("only"), 1500).unwrap();
    assert_eq!(
        start_tournament(&mut t),
        Err(TournamentError::NotEnoughParticipants { required: 2 })
    );
    assert_eq!(t.state, TournamentState::Registration);
}

#[test]
fn registration_rejects_duplicates_and_closes_on_start() {
    let mut t = Tournament::new("reg");
    register_participant(&mut t, PlayerId::new("alice"), 1500).unwrap();
    assert_eq!(
        register_participant(&mut t, PlayerId::new("alice"), 1600),
        Err(TournamentError::DuplicatePlayer(PlayerId::new("alice")))
    );
    register_participant(&mut t, PlayerId::new("bob"), 1400).unwrap();
    start_tournament(&mut t).unwrap();
    assert_eq!(
        register_participant(&mut t, PlayerId::new("carol"), 1300),
        Err(TournamentError::InvalidState)
    );
}

#[test]
fn roster_csv_imports_all_rows() {
    let mut t = Tournament::new("csv");
    let csv = "player_id,rating\nalice, 2100\nbob,1950\n carol ,1800\n";
    assert_eq!(import_roster_csv(&mut t, csv.as_bytes()).unwrap(), 3);
    let carol = t.participant_by_player(&PlayerId::new("carol")).unwrap();
    assert_eq!(carol.rating, 1800);
}

#[test]
fn roster_csv_is_all_or_nothing() {
    let mut t = Tournament::new("csv");
    let duplicate = "player_id,rating\nalice,2100\nalice,1950\n";
    assert!(import_roster_csv(&mut t, duplicate.as_bytes()).is_err());
    assert!(t.participants.is_empty());

    let bad_rating = "player_id,rating\nalice,2100\nbob,strong\n";
    assert!(matches!(
        import_roster_csv(&mut t, bad_rating.as_bytes()),
        Err(TournamentError::InvalidRoster(_))
    ));
    assert!(t.participants.is_empty());
}

#[test]
fn scores_are_conserved_per_round() {
    let mut t = started(&[2400, 2300, 2200, 2100, 2000]);
    let before = total_score(&t);
    let pairings = start_round(&mut t, 1).unwrap();
    let games: Vec<_> = pairings.iter().filter(|p| !p.is_bye).collect();
    apply_result(&mut t, games[0].game_id, GameResult::WhiteWin).unwrap();
    apply_result(&mut t, games[1].game_id, GameResult::Draw).unwrap();

    // One point per decisive game, per drawn game, and per bye.
    assert_eq!(total_score(&t) - before, pairings.len() as f64);
    assert_tiebreaks_consistent(&t);
}

#[test]
fn tiebreaks_follow_opponent_scores_across_rounds() {
    let mut t = started(&[2400, 2300, 2200, 2100]);
    for round in 1..=t.total_rounds {
        let pairings = start_round(&mut t, round).unwrap();
        for (i, p) in pairings.iter().enumerate() {
            let result = if i % 2 == 0 {
                GameResult::WhiteWin
            } else {
                GameResult::Draw
            };
            apply_result(&mut t, p.game_id, result).unwrap();
            assert_tiebreaks_consistent(&t);
        }
        complete_round(&mut t, round).unwrap();
    }
    let draws: u32 = t.participants.iter().map(|p| p.draws).sum();
    assert_eq!(draws, 4);
}

#[test]
fn result_can_be_applied_once() {
    let mut t = started(&[2000, 1900, 1800]);
    let pairings = start_round(&mut t, 1).unwrap();
    let game = pairings.iter().find(|p| !p.is_bye).unwrap();
    let bye = pairings.iter().find(|p| p.is_bye).unwrap();

    apply_result(&mut t, game.game_id, GameResult::BlackWin).unwrap();
    assert_eq!(
        apply_result(&mut t, game.game_id, GameResult::WhiteWin),
        Err(TournamentError::ResultAlreadyRecorded(game.game_id))
    );
    assert_eq!(
        apply_result(&mut t, bye.game_id, GameResult::Draw),
        Err(TournamentError::ResultAlreadyRecorded(bye.game_id))
    );
    let black = t.participant(game.black).unwrap();
    assert_eq!((black.wins, black.score), (1, 1.0));
}

#[test]
fn round_lifecycle_enforces_order() {
    let mut t = started(&[2000, 1900, 1800, 1700]);
    assert_eq!(t.total_rounds, 2);
    assert_eq!(t.round(1).unwrap().status, RoundStatus::Pending);
    assert!(t.round(1).unwrap().pairings.is_empty());
    assert!(matches!(
        start_round(&mut t, 2),
        Err(TournamentError::InvalidRound { requested: 2, .. })
    ));

    let pairings = start_round(&mut t, 1).unwrap();
    assert!(!is_round_complete(t.current().unwrap()));
    assert_eq!(complete_round(&mut t, 1), Err(TournamentError::RoundIncomplete(1)));
    assert!(matches!(
        start_round(&mut t, 2),
        Err(TournamentError::RoundIncomplete(1))
    ));

    for p in &pairings {
        apply_result(&mut t, p.game_id, GameResult::WhiteWin).unwrap();
    }
    assert!(is_round_complete(t.current().unwrap()));
    assert!(!is_tournament_complete(&t));
    assert_eq!(complete_round(&mut t, 1), Ok(RoundCompletion::NextRound(2)));
    assert_eq!(t.round(1).unwrap().status, RoundStatus::Completed);
    assert_eq!(t.round(2).unwrap().status, RoundStatus::Pending);
    assert_eq!(t.current_round, 1);

    let pairings = start_round(&mut t, 2).unwrap();
    assert_eq!(t.rounds.len(), 2);
    assert_eq!(t.round(2).unwrap().status, RoundStatus::Active);
    for p in &pairings {
        apply_result(&mut t, p.game_id, GameResult::Draw).unwrap();
    }
    assert!(is_tournament_complete(&t));
    assert_eq!(
        complete_round(&mut t, 2),
        Ok(RoundCompletion::TournamentComplete)
    );
    assert_eq!(t.state, TournamentState::Completed);
    assert!(t.completed_at.is_some());
    assert!(matches!(
        start_round(&mut t, 3),
        Err(TournamentError::InvalidState)
    ));
}

#[test]
fn tournament_can_be_completed_early() {
    let mut t = started(&[2000, 1900, 1800, 1700]);
    let pairings = start_round(&mut t, 1).unwrap();
    for p in &pairings {
        apply_result(&mut t, p.game_id, GameResult::WhiteWin).unwrap();
    }
    complete_round(&mut t, 1).unwrap();
    assert_eq!(t.rounds.len(), 2);

    // The pending round 2 is dropped, not left waiting forever.
    complete_tournament(&mut t).unwrap();
    assert_eq!(t.state, TournamentState::Completed);
    assert_eq!(t.rounds.len(), 1);
    assert_eq!(complete_tournament(&mut t), Err(TournamentError::InvalidState));
}

#[test]
fn standings_rank_by_score_then_tiebreaks() {
    let mut t = started(&[2400, 2300, 2200, 2100]);
    let pairings = start_round(&mut t, 1).unwrap();
    for p in &pairings {
        apply_result(&mut t, p.game_id, GameResult::BlackWin).unwrap();
    }
    let table = standings(&t);
    assert_eq!(table.len(), 4);
    assert_eq!(
        table.iter().map(|s| s.rank).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
    for pair in table.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    // Winners had black and equal tiebreaks, so rating decides between them.
    assert_eq!(table[0].score, 1.0);
    assert!(table[0].rating > table[1].rating);
    assert_eq!(table[0].wins, 1);
    assert_eq!(table[3].losses, 1);
}
