//! Data structures for Swiss tournaments: participants, pairings, rounds, tournament state.

mod game;
mod player;
mod tournament;

pub use game::{Color, GameId, GameResult, Pairing};
pub use player::{GameRecord, Participant, ParticipantId, PlayerId, Standing};
pub use tournament::{Round, RoundStatus, Tournament, TournamentError, TournamentId, TournamentState};
