//! Pairing (one board of a round), Color, and GameResult.

use crate::models::player::ParticipantId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a game. A tournament game's live session shares this id.
pub type GameId = Uuid;

/// Side to move / side played.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => f.write_str("white"),
            Color::Black => f.write_str("black"),
        }
    }
}

/// Decided outcome of a game.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    WhiteWin,
    BlackWin,
    Draw,
}

impl GameResult {
    /// Result in favour of `winner`, or a draw when there is none.
    pub fn from_winner(winner: Option<Color>) -> Self {
        match winner {
            Some(Color::White) => GameResult::WhiteWin,
            Some(Color::Black) => GameResult::BlackWin,
            None => GameResult::Draw,
        }
    }

    pub fn winner(self) -> Option<Color> {
        match self {
            GameResult::WhiteWin => Some(Color::White),
            GameResult::BlackWin => Some(Color::Black),
            GameResult::Draw => None,
        }
    }

    /// Points scored by the given side (1, 0.5 or 0).
    pub fn score_for(self, color: Color) -> f64 {
        match self.winner() {
            Some(w) if w == color => 1.0,
            Some(_) => 0.0,
            None => 0.5,
        }
    }
}

/// One matchup within a round. A bye has `white == black`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Pairing {
    pub game_id: GameId,
    /// 1-based, dense within the round. Display order only.
    pub board: u32,
    pub white: ParticipantId,
    pub black: ParticipantId,
    pub is_bye: bool,
    /// None until decided. Always None for a bye.
    pub result: Option<GameResult>,
    /// Set when no non-repeat opponent was available.
    pub rematch: bool,
}

impl Pairing {
    pub fn game(board: u32, white: ParticipantId, black: ParticipantId, rematch: bool) -> Self {
        Self {
            game_id: Uuid::new_v4(),
            board,
            white,
            black,
            is_bye: false,
            result: None,
            rematch,
        }
    }

    pub fn bye(board: u32, participant: ParticipantId) -> Self {
        Self {
            game_id: Uuid::new_v4(),
            board,
            white: participant,
            black: participant,
            is_bye: true,
            result: None,
            rematch: false,
        }
    }

    /// A bye is resolved as soon as it exists.
    pub fn is_resolved(&self) -> bool {
        self.is_bye || self.result.is_some()
    }

    pub fn involves(&self, participant: ParticipantId) -> bool {
        self.white == participant || self.black == participant
    }
}
