//! Move legality and terminal detection, delegated to `shakmaty`.
//!
//! The live session only ever sees a `Board`: apply a UCI move, read the turn,
//! read the FEN, ask whether the game is over. Repetition is tracked here because
//! the rules library has no game history of its own.

use crate::models::Color;
use shakmaty::fen::{Epd, Fen};
use shakmaty::san::San;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position};
use std::collections::HashMap;

/// Why the rules library refused a move or position.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum RulesError {
    #[error("malformed move '{0}'")]
    Malformed(String),
    #[error("illegal move '{0}'")]
    Illegal(String),
    #[error("invalid position: {0}")]
    InvalidPosition(String),
}

/// Terminal condition reached by the last move.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Terminal {
    Checkmate { winner: Color },
    Stalemate,
    Repetition,
    InsufficientMaterial,
    FiftyMoveRule,
}

/// An accepted move.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlayedMove {
    pub mover: Color,
    pub uci: String,
    pub san: String,
    /// Position after the move.
    pub fen: String,
}

#[derive(Clone, Debug)]
pub struct Board {
    position: Chess,
    /// EPD of every position reached, for threefold repetition.
    seen: HashMap<String, u32>,
}

impl Default for Board {
    fn default() -> Self {
        Self::from_chess(Chess::default())
    }
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        let position = Fen::from_ascii(fen.as_bytes())
            .map_err(|e| RulesError::InvalidPosition(e.to_string()))?
            .into_position::<Chess>(CastlingMode::Standard)
            .map_err(|e| RulesError::InvalidPosition(e.to_string()))?;
        Ok(Self::from_chess(position))
    }

    fn from_chess(position: Chess) -> Self {
        let mut board = Self {
            position,
            seen: HashMap::new(),
        };
        board.remember();
        board
    }

    fn remember(&mut self) {
        let key = Epd::from_position(self.position.clone(), EnPassantMode::Legal).to_string();
        *self.seen.entry(key).or_insert(0) += 1;
    }

    pub fn turn(&self) -> Color {
        match self.position.turn() {
            shakmaty::Color::White => Color::White,
            shakmaty::Color::Black => Color::Black,
        }
    }

    pub fn fen(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }

    /// Validate and apply a UCI move (e.g. `e2e4`, `e7e8q`). The board is unchanged on error.
    pub fn play(&mut self, uci: &str) -> Result<PlayedMove, RulesError> {
        let parsed = UciMove::from_ascii(uci.trim().as_bytes())
            .map_err(|_| RulesError::Malformed(uci.to_string()))?;
        let m = parsed
            .to_move(&self.position)
            .map_err(|_| RulesError::Illegal(uci.to_string()))?;

        let mover = self.turn();
        let san = San::from_move(&self.position, &m).to_string();
        self.position.play_unchecked(&m);
        self.remember();

        Ok(PlayedMove {
            mover,
            uci: parsed.to_string(),
            san,
            fen: self.fen(),
        })
    }

    /// Whether the current position ends the game.
    pub fn terminal(&self) -> Option<Terminal> {
        if self.position.is_checkmate() {
            return Some(Terminal::Checkmate {
                winner: self.turn().opposite(),
            });
        }
        if self.position.is_stalemate() {
            return Some(Terminal::Stalemate);
        }
        if self.position.is_insufficient_material() {
            return Some(Terminal::InsufficientMaterial);
        }
        if self.seen.values().any(|&n| n >= 3) {
            return Some(Terminal::Repetition);
        }
        if self.position.halfmoves() >= 100 {
            return Some(Terminal::FiftyMoveRule);
        }
        None
    }
}
