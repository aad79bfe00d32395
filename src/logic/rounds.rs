//! Round lifecycle: pending -> active -> completed, and tournament completion.

use crate::logic::pairing::generate_pairings;
use crate::logic::results::{apply_bye, is_round_complete, recompute_tiebreaks};
use crate::models::{Pairing, Round, RoundStatus, Tournament, TournamentError, TournamentState};
use chrono::Utc;

/// What completing a round led to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RoundCompletion {
    /// More rounds remain; this one should start next.
    NextRound(u32),
    /// That was the last round; the tournament is now Completed.
    TournamentComplete,
}

/// Pair and activate round `number`, filling in its pending entry if there is one.
/// Round `number - 1` must be completed.
/// Byes are credited immediately. Returns the round's pairings.
pub fn start_round(
    tournament: &mut Tournament,
    number: u32,
) -> Result<Vec<Pairing>, TournamentError> {
    if tournament.state != TournamentState::Active {
        return Err(TournamentError::InvalidState);
    }
    if number != tournament.current_round + 1 || number > tournament.total_rounds {
        return Err(TournamentError::InvalidRound {
            requested: number,
            current: tournament.current_round,
            total: tournament.total_rounds,
        });
    }
    if let Some(prev) = tournament.current() {
        if prev.status != RoundStatus::Completed {
            return Err(TournamentError::RoundIncomplete(prev.number));
        }
    }

    let pairings = generate_pairings(&tournament.participants, number);

    if tournament.round(number).is_none() {
        tournament.rounds.push(Round::new(number));
    }
    let round = tournament
        .round_mut(number)
        .ok_or(TournamentError::InvalidState)?;
    round.pairings = pairings.clone();
    round.status = RoundStatus::Active;
    round.started_at = Some(Utc::now());
    tournament.current_round = number;

    for p in pairings.iter().filter(|p| p.is_bye) {
        apply_bye(tournament, p.white)?;
    }

    log::info!("Tournament {}: round {} started", tournament.id, number);
    Ok(pairings)
}

/// Close round `number`. Every pairing must have a result. When rounds remain, the
/// next one is added as pending until it is started.
pub fn complete_round(
    tournament: &mut Tournament,
    number: u32,
) -> Result<RoundCompletion, TournamentError> {
    if tournament.state != TournamentState::Active {
        return Err(TournamentError::InvalidState);
    }
    let (current, total) = (tournament.current_round, tournament.total_rounds);
    if number != current {
        return Err(TournamentError::InvalidRound {
            requested: number,
            current,
            total,
        });
    }
    let round = tournament
        .round_mut(number)
        .ok_or(TournamentError::InvalidRound {
            requested: number,
            current,
            total,
        })?;
    if round.status != RoundStatus::Active {
        return Err(TournamentError::InvalidState);
    }
    if !is_round_complete(round) {
        return Err(TournamentError::RoundIncomplete(number));
    }
    round.status = RoundStatus::Completed;
    round.ended_at = Some(Utc::now());
    recompute_tiebreaks(&mut tournament.participants);
    log::info!("Tournament {}: round {} completed", tournament.id, number);

    if number >= total {
        finish(tournament);
        Ok(RoundCompletion::TournamentComplete)
    } else {
        tournament.rounds.push(Round::new(number + 1));
        Ok(RoundCompletion::NextRound(number + 1))
    }
}

/// End the tournament now, whatever round it is in.
pub fn complete_tournament(tournament: &mut Tournament) -> Result<(), TournamentError> {
    if tournament.state != TournamentState::Active {
        return Err(TournamentError::InvalidState);
    }
    finish(tournament);
    Ok(())
}

fn finish(tournament: &mut Tournament) {
    tournament.state = TournamentState::Completed;
    // A round that was waiting to start never will.
    tournament
        .rounds
        .retain(|r| r.status != RoundStatus::Pending);
    tournament.completed_at = Some(Utc::now());
    log::info!(
        "Tournament {} completed after round {}",
        tournament.id,
        tournament.current_round
    );
}
