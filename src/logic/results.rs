//! Result aggregation: scores, Buchholz and Sonneborn-Berger, completion checks, standings.

use crate::models::{
    Color, GameId, GameResult, Participant, ParticipantId, Round, RoundStatus, Standing,
    Tournament, TournamentError, TournamentState,
};
use std::collections::HashMap;

/// Apply a decided result to a pairing of the current round.
///
/// Updates both participants' records and recomputes every participant's tiebreaks,
/// since those depend on opponents' current scores. Returns the round number.
pub fn apply_result(
    tournament: &mut Tournament,
    game_id: GameId,
    result: GameResult,
) -> Result<u32, TournamentError> {
    if tournament.state != TournamentState::Active {
        return Err(TournamentError::InvalidState);
    }
    let round_number = tournament.current_round;
    let round = tournament
        .round_mut(round_number)
        .ok_or(TournamentError::GameNotFound(game_id))?;
    if round.status != RoundStatus::Active {
        return Err(TournamentError::InvalidState);
    }
    let pairing = round
        .pairing_mut(game_id)
        .ok_or(TournamentError::GameNotFound(game_id))?;
    if pairing.is_resolved() {
        return Err(TournamentError::ResultAlreadyRecorded(game_id));
    }
    pairing.result = Some(result);
    let (white_id, black_id) = (pairing.white, pairing.black);

    record_game(tournament, white_id, black_id, result)?;
    recompute_tiebreaks(&mut tournament.participants);
    Ok(round_number)
}

/// Credit a bye (one point) to a participant.
pub fn apply_bye(
    tournament: &mut Tournament,
    participant: ParticipantId,
) -> Result<(), TournamentError> {
    tournament
        .participant_mut(participant)
        .ok_or(TournamentError::ParticipantNotFound(participant))?
        .record_bye();
    recompute_tiebreaks(&mut tournament.participants);
    Ok(())
}

/// Copy opponents out before mutating so we never hold two mutable borrows into the roster.
fn record_game(
    tournament: &mut Tournament,
    white_id: ParticipantId,
    black_id: ParticipantId,
    result: GameResult,
) -> Result<(), TournamentError> {
    let white = tournament
        .participant(white_id)
        .cloned()
        .ok_or(TournamentError::ParticipantNotFound(white_id))?;
    let black = tournament
        .participant(black_id)
        .cloned()
        .ok_or(TournamentError::ParticipantNotFound(black_id))?;

    if let Some(p) = tournament.participant_mut(white_id) {
        p.record_game(&black, Color::White, result.score_for(Color::White));
    }
    if let Some(p) = tournament.participant_mut(black_id) {
        p.record_game(&white, Color::Black, result.score_for(Color::Black));
    }
    Ok(())
}

/// Buchholz = sum of opponents' current scores.
/// Sonneborn-Berger = sum of own game score times opponent's current score.
pub fn recompute_tiebreaks(participants: &mut [Participant]) {
    let scores: HashMap<ParticipantId, f64> =
        participants.iter().map(|p| (p.id, p.score)).collect();
    for p in participants.iter_mut() {
        let mut buchholz = 0.0;
        let mut sonneborn_berger = 0.0;
        for game in &p.games {
            let opp_score = scores.get(&game.opponent).copied().unwrap_or(0.0);
            buchholz += opp_score;
            sonneborn_berger += game.own_score * opp_score;
        }
        p.buchholz = buchholz;
        p.sonneborn_berger = sonneborn_berger;
    }
}

/// True iff every pairing has a result (byes count as resolved).
pub fn is_round_complete(round: &Round) -> bool {
    round.pairings.iter().all(|p| p.is_resolved())
}

/// True iff the last scheduled round has been reached and is complete.
pub fn is_tournament_complete(tournament: &Tournament) -> bool {
    tournament.current_round >= tournament.total_rounds
        && tournament.current().is_some_and(is_round_complete)
}

/// Standings: score, then Buchholz, then Sonneborn-Berger, then rating. Ranks are 1-based.
pub fn standings(tournament: &Tournament) -> Vec<Standing> {
    let mut sorted: Vec<&Participant> = tournament.participants.iter().collect();
    sorted.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.buchholz.total_cmp(&a.buchholz))
            .then_with(|| b.sonneborn_berger.total_cmp(&a.sonneborn_berger))
            .then_with(|| b.rating.cmp(&a.rating))
    });
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, p)| p.standing(i + 1))
        .collect()
}
