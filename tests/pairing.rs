//! Integration tests for Swiss pairing: round count, byes, score groups and rematches.

use std::collections::{HashMap, HashSet};
use swiss_arena::logic::{
    apply_result, complete_round, compute_rounds, generate_pairings, register_participant,
    start_round, start_tournament,
};
use swiss_arena::{Color, GameResult, Pairing, Participant, ParticipantId, PlayerId, Tournament};

fn tournament(ratings: &[i32]) -> Tournament {
    let mut t = Tournament::new("pairing test");
    for (i, rating) in ratings.iter().enumerate() {
        register_participant(&mut t, PlayerId::new(format!("p{i}")), *rating).unwrap();
    }
    t
}

fn rating_of(t: &Tournament, id: ParticipantId) -> i32 {
    t.participant(id).unwrap().rating
}

/// Higher rating wins; equal ratings draw.
fn play_round(t: &mut Tournament, number: u32) -> Vec<Pairing> {
    let pairings = start_round(t, number).unwrap();
    for p in pairings.iter().filter(|p| !p.is_bye) {
        let result = match rating_of(t, p.white).cmp(&rating_of(t, p.black)) {
            std::cmp::Ordering::Greater => GameResult::WhiteWin,
            std::cmp::Ordering::Less => GameResult::BlackWin,
            std::cmp::Ordering::Equal => GameResult::Draw,
        };
        apply_result(t, p.game_id, result).unwrap();
    }
    complete_round(t, number).unwrap();
    pairings
}

#[test]
fn round_count_follows_field_size() {
    let counts = [1, 2, 4, 5, 8, 9, 16, 17];
    let expected = [0, 1, 2, 3, 3, 4, 4, 5];
    for (n, rounds) in counts.iter().zip(expected) {
        assert_eq!(compute_rounds(*n), rounds, "{n} participants");
    }
    assert_eq!(compute_rounds(256), 8);
    assert_eq!(compute_rounds(257), 9);
    assert_eq!(compute_rounds(1000), 10);
}

#[test]
fn five_players_first_round_has_two_games_and_a_bye_for_the_lowest() {
    let mut t = tournament(&[2400, 2300, 2200, 2100, 2000]);
    start_tournament(&mut t).unwrap();
    assert_eq!(t.total_rounds, 3);

    let pairings = start_round(&mut t, 1).unwrap();
    assert_eq!(pairings.len(), 3);
    assert_eq!(pairings.iter().filter(|p| p.is_bye).count(), 1);

    let bye = pairings.iter().find(|p| p.is_bye).unwrap();
    assert_eq!(rating_of(&t, bye.white), 2000);
    assert_eq!(bye.board, 3);

    // Byes are credited when the round starts.
    let lowest = t.participant(bye.white).unwrap();
    assert_eq!(lowest.score, 1.0);
    assert_eq!(lowest.byes, 1);

    let boards: Vec<u32> = pairings.iter().map(|p| p.board).collect();
    assert_eq!(boards, vec![1, 2, 3]);

    // Top half meets the nearest-rated bottom-half player; higher rated gets white.
    assert_eq!(rating_of(&t, pairings[0].white), 2400);
    assert_eq!(rating_of(&t, pairings[0].black), 2200);
    assert_eq!(rating_of(&t, pairings[1].white), 2300);
    assert_eq!(rating_of(&t, pairings[1].black), 2100);
    assert!(pairings.iter().all(|p| !p.rematch));
}

#[test]
fn second_bye_goes_to_someone_without_one() {
    let mut t = tournament(&[2400, 2300, 2200, 2100, 2000]);
    start_tournament(&mut t).unwrap();
    let first = play_round(&mut t, 1);
    let first_bye = first.iter().find(|p| p.is_bye).unwrap().white;

    let second = start_round(&mut t, 2).unwrap();
    let second_bye = second.iter().find(|p| p.is_bye).unwrap().white;
    assert_ne!(first_bye, second_bye);
    assert_eq!(rating_of(&t, second_bye), 2100);
    assert!(t.participants.iter().all(|p| p.byes <= 1));
}

#[test]
fn bye_prefers_players_without_one_within_the_group() {
    let a = Participant::new(PlayerId::new("a"), 2000);
    let b = Participant::new(PlayerId::new("b"), 1900);
    let mut c = Participant::new(PlayerId::new("c"), 1800);
    c.byes = 1;
    let roster = vec![a, b.clone(), c];

    let pairings = generate_pairings(&roster, 2);
    let bye = pairings.iter().find(|p| p.is_bye).unwrap();
    assert_eq!(bye.white, b.id);
    assert_eq!(bye.white, bye.black);
}

#[test]
fn empty_roster_pairs_nothing() {
    assert!(generate_pairings(&[], 1).is_empty());
}

#[test]
fn lone_participant_gets_a_bye() {
    let only = Participant::new(PlayerId::new("solo"), 1500);
    let pairings = generate_pairings(std::slice::from_ref(&only), 1);
    assert_eq!(pairings.len(), 1);
    assert!(pairings[0].is_bye);
    assert_eq!(pairings[0].white, only.id);
    assert_eq!(pairings[0].board, 1);
}

#[test]
fn every_participant_plays_once_per_round() {
    let mut t = tournament(&[1800, 1750, 1700, 1650, 1600, 1550, 1500]);
    start_tournament(&mut t).unwrap();
    for round in 1..=t.total_rounds {
        let pairings = play_round(&mut t, round);
        let mut seen = HashSet::new();
        for p in &pairings {
            assert!(seen.insert(p.white), "round {round}: white seated twice");
            if !p.is_bye {
                assert!(seen.insert(p.black), "round {round}: black seated twice");
            }
        }
        assert_eq!(seen.len(), t.participants.len());
    }
}

#[test]
fn full_run_has_no_unflagged_rematches() {
    let ratings: Vec<i32> = (0..8).map(|i| 2000 - i * 37).collect();
    let mut t = tournament(&ratings);
    start_tournament(&mut t).unwrap();
    assert!(t.participants.len() >= t.total_rounds as usize * 2);

    let mut met: HashMap<(ParticipantId, ParticipantId), u32> = HashMap::new();
    for round in 1..=t.total_rounds {
        for p in play_round(&mut t, round).iter().filter(|p| !p.is_bye) {
            let key = if p.white < p.black {
                (p.white, p.black)
            } else {
                (p.black, p.white)
            };
            let times = met.entry(key).or_insert(0);
            *times += 1;
            if *times > 1 {
                assert!(p.rematch, "round {round}: repeat pairing not flagged");
            } else {
                assert!(!p.rematch, "round {round}: first meeting flagged as rematch");
            }
        }
    }
}

#[test]
fn forced_rematch_is_paired_and_flagged() {
    let mut a = Participant::new(PlayerId::new("a"), 2000);
    let mut b = Participant::new(PlayerId::new("b"), 1900);
    let (a0, b0) = (a.clone(), b.clone());
    a.record_game(&b0, Color::White, 1.0);
    b.record_game(&a0, Color::Black, 0.0);

    let pairings = generate_pairings(&[a.clone(), b.clone()], 2);
    assert_eq!(pairings.len(), 1);
    assert!(pairings[0].rematch);
    // b had black last time, so b gets white now.
    assert_eq!(pairings[0].white, b.id);
    assert_eq!(pairings[0].black, a.id);
}

#[test]
fn colour_balance_is_recorded_per_game() {
    let mut t = tournament(&[2000, 1900]);
    start_tournament(&mut t).unwrap();
    assert_eq!(t.total_rounds, 1);
    let pairings = play_round(&mut t, 1);
    let white = t.participant(pairings[0].white).unwrap();
    let black = t.participant(pairings[0].black).unwrap();
    assert_eq!(white.color_balance(), 1);
    assert_eq!(black.color_balance(), -1);
}
