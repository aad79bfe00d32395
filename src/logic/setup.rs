//! Registration phase: roster entry, CSV import, and start (Registration -> Active).

use crate::logic::pairing::compute_rounds;
use crate::models::{
    Participant, ParticipantId, PlayerId, Round, Tournament, TournamentError, TournamentState,
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Read;

/// Minimum field size for a Swiss event.
pub const MIN_PARTICIPANTS: usize = 2;

/// Register a player (Registration only). Identities must be unique.
pub fn register_participant(
    tournament: &mut Tournament,
    player_id: PlayerId,
    rating: i32,
) -> Result<ParticipantId, TournamentError> {
    if tournament.state != TournamentState::Registration {
        return Err(TournamentError::InvalidState);
    }
    if player_id.as_str().trim().is_empty() {
        return Err(TournamentError::InvalidRoster("empty player id".into()));
    }
    if tournament.participant_by_player(&player_id).is_some() {
        return Err(TournamentError::DuplicatePlayer(player_id));
    }
    let participant = Participant::new(player_id, rating);
    let id = participant.id;
    tournament.participants.push(participant);
    Ok(id)
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    player_id: String,
    rating: i32,
}

/// Import `player_id,rating` rows (header required). Either every row is registered or none is.
pub fn import_roster_csv<R: Read>(
    tournament: &mut Tournament,
    reader: R,
) -> Result<usize, TournamentError> {
    if tournament.state != TournamentState::Registration {
        return Err(TournamentError::InvalidState);
    }
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    let mut seen = HashSet::new();
    for record in csv_reader.deserialize::<RosterRow>() {
        let row = record.map_err(|e| TournamentError::InvalidRoster(e.to_string()))?;
        let player_id = PlayerId::new(row.player_id);
        if player_id.as_str().is_empty() {
            return Err(TournamentError::InvalidRoster("empty player id".into()));
        }
        if !seen.insert(player_id.clone()) || tournament.participant_by_player(&player_id).is_some() {
            return Err(TournamentError::DuplicatePlayer(player_id));
        }
        rows.push((player_id, row.rating));
    }

    let count = rows.len();
    for (player_id, rating) in rows {
        register_participant(tournament, player_id, rating)?;
    }
    log::info!("Imported {} participant(s) into tournament {}", count, tournament.id);
    Ok(count)
}

/// Start the tournament: requires at least two participants. Ratings are frozen from here on
/// and the number of rounds is fixed. Round 1 is added as pending and started separately.
pub fn start_tournament(tournament: &mut Tournament) -> Result<(), TournamentError> {
    if tournament.state != TournamentState::Registration {
        return Err(TournamentError::InvalidState);
    }
    if tournament.participants.len() < MIN_PARTICIPANTS {
        return Err(TournamentError::NotEnoughParticipants {
            required: MIN_PARTICIPANTS,
        });
    }
    tournament.total_rounds = compute_rounds(tournament.participants.len());
    tournament.current_round = 0;
    tournament.rounds = vec![Round::new(1)];
    tournament.state = TournamentState::Active;
    tournament.started_at = Some(Utc::now());
    log::info!(
        "Tournament {} started: {} participants, {} rounds",
        tournament.id,
        tournament.participants.len(),
        tournament.total_rounds
    );
    Ok(())
}
