//! Participant, PlayerId and Standing data structures.

use crate::models::game::Color;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a tournament entrant (used in pairings and lookups).
pub type ParticipantId = Uuid;

/// Stable identity of a player across tournaments and live sessions (account or wallet id).
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One game a participant has finished: who it was against, with which colour, and what they scored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub opponent: ParticipantId,
    pub color: Color,
    /// 1.0 win, 0.5 draw, 0.0 loss.
    pub own_score: f64,
}

/// A tournament entrant with running score and tiebreak figures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub player_id: PlayerId,
    /// Snapshotted at registration; frozen once the tournament starts.
    pub rating: i32,
    pub score: f64,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub byes: u32,
    pub buchholz: f64,
    pub sonneborn_berger: f64,
    /// Identities already met. Never shrinks.
    pub opponent_history: BTreeSet<PlayerId>,
    pub games: Vec<GameRecord>,
}

impl Participant {
    /// Create a new participant. Score and tiebreaks start at zero.
    pub fn new(player_id: PlayerId, rating: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            player_id,
            rating,
            score: 0.0,
            wins: 0,
            losses: 0,
            draws: 0,
            byes: 0,
            buchholz: 0.0,
            sonneborn_berger: 0.0,
            opponent_history: BTreeSet::new(),
            games: Vec::new(),
        }
    }

    pub fn has_met(&self, other: &PlayerId) -> bool {
        self.opponent_history.contains(other)
    }

    pub fn white_games(&self) -> usize {
        self.games.iter().filter(|g| g.color == Color::White).count()
    }

    pub fn black_games(&self) -> usize {
        self.games.iter().filter(|g| g.color == Color::Black).count()
    }

    /// Whites minus blacks. Positive means this participant is due black.
    pub fn color_balance(&self) -> i64 {
        self.white_games() as i64 - self.black_games() as i64
    }

    /// Record a finished game against `opponent`.
    pub fn record_game(&mut self, opponent: &Participant, color: Color, own_score: f64) {
        if own_score >= 1.0 {
            self.wins += 1;
        } else if own_score <= 0.0 {
            self.losses += 1;
        } else {
            self.draws += 1;
        }
        self.score += own_score;
        self.opponent_history.insert(opponent.player_id.clone());
        self.games.push(GameRecord {
            opponent: opponent.id,
            color,
            own_score,
        });
    }

    /// Record a bye: counts as a full point.
    pub fn record_bye(&mut self) {
        self.byes += 1;
        self.score += 1.0;
    }

    /// Current standings row (rank is filled in by the caller).
    pub fn standing(&self, rank: usize) -> Standing {
        Standing {
            rank,
            player_id: self.player_id.clone(),
            rating: self.rating,
            score: self.score,
            wins: self.wins,
            losses: self.losses,
            draws: self.draws,
            buchholz: self.buchholz,
            sonneborn_berger: self.sonneborn_berger,
        }
    }
}

/// One row of the standings table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub rank: usize,
    pub player_id: PlayerId,
    pub rating: i32,
    pub score: f64,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub buchholz: f64,
    pub sonneborn_berger: f64,
}
