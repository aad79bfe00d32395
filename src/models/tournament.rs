//! Tournament, Round and TournamentState.

use crate::models::game::{GameId, Pairing};
use crate::models::player::{Participant, ParticipantId, PlayerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors that can occur during tournament operations.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TournamentError {
    /// Tournament is not in a state that allows this action.
    #[error("Invalid state for this action")]
    InvalidState,
    /// Need at least 2 participants to start.
    #[error("Need at least {required} participants to start")]
    NotEnoughParticipants { required: usize },
    /// A participant with this identity is already registered.
    #[error("Player {0} is already registered")]
    DuplicatePlayer(PlayerId),
    #[error("Participant not found")]
    ParticipantNotFound(ParticipantId),
    /// Round number out of sequence or beyond the schedule.
    #[error("Invalid round number {requested} (current round {current}, total {total})")]
    InvalidRound { requested: u32, current: u32, total: u32 },
    /// Round cannot complete until every pairing has a result.
    #[error("Round {0} still has undecided games")]
    RoundIncomplete(u32),
    #[error("Game not found in the current round")]
    GameNotFound(GameId),
    /// Result already recorded for this game (or game is a bye).
    #[error("Result already recorded for this game")]
    ResultAlreadyRecorded(GameId),
    /// The declared winner does not match the submitted result.
    #[error("Declared winner does not match the result")]
    WinnerMismatch,
    /// Roster CSV could not be read.
    #[error("Invalid roster: {0}")]
    InvalidRoster(String),
}

/// Unique identifier for a tournament.
pub type TournamentId = Uuid;

/// Current phase of the tournament.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentState {
    /// Registering participants; not started.
    #[default]
    Registration,
    /// Rounds are being paired and played.
    Active,
    /// Final standings are fixed.
    Completed,
}

/// Lifecycle of one round.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    #[default]
    Pending,
    Active,
    Completed,
}

/// One pairing cycle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Round {
    /// 1-based.
    pub number: u32,
    pub status: RoundStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub pairings: Vec<Pairing>,
}

impl Round {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            status: RoundStatus::Pending,
            started_at: None,
            ended_at: None,
            pairings: Vec::new(),
        }
    }

    pub fn pairing(&self, game_id: GameId) -> Option<&Pairing> {
        self.pairings.iter().find(|p| p.game_id == game_id)
    }

    pub fn pairing_mut(&mut self, game_id: GameId) -> Option<&mut Pairing> {
        self.pairings.iter_mut().find(|p| p.game_id == game_id)
    }
}

/// Full tournament state: roster, rounds, and phase.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub state: TournamentState,
    pub participants: Vec<Participant>,
    pub rounds: Vec<Round>,
    /// Fixed when the tournament starts.
    pub total_rounds: u32,
    /// 0 before round 1 is started.
    pub current_round: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Tournament {
    /// Create a new tournament in Registration state with no participants.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            state: TournamentState::Registration,
            participants: Vec::new(),
            rounds: Vec::new(),
            total_rounds: 0,
            current_round: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Create a tournament with an initial roster. Still in Registration until started.
    pub fn with_participants(name: impl Into<String>, participants: Vec<Participant>) -> Self {
        Self {
            participants,
            ..Self::new(name)
        }
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    pub fn participant_by_player(&self, player_id: &PlayerId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.player_id == player_id)
    }

    pub fn round(&self, number: u32) -> Option<&Round> {
        self.rounds.iter().find(|r| r.number == number)
    }

    pub fn round_mut(&mut self, number: u32) -> Option<&mut Round> {
        self.rounds.iter_mut().find(|r| r.number == number)
    }

    pub fn current(&self) -> Option<&Round> {
        self.round(self.current_round)
    }

    /// Round number that contains `game_id`, if any.
    pub fn round_of_game(&self, game_id: GameId) -> Option<u32> {
        self.rounds
            .iter()
            .find(|r| r.pairing(game_id).is_some())
            .map(|r| r.number)
    }
}
