//! Events broadcast to a session's players and spectators.

use crate::live::session::{MoveRecord, SessionId, Termination};
use crate::models::{Color, GameResult, PlayerId};
use serde::Serialize;

/// Everything a subscriber to a live session can observe, in acceptance order.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// One side is seated; still waiting for the other.
    Waiting {
        session_id: SessionId,
        seated: PlayerId,
        color: Color,
    },
    /// Both sides seated; white to move.
    Matched {
        session_id: SessionId,
        white: PlayerId,
        black: PlayerId,
        fen: String,
    },
    MoveAccepted {
        session_id: SessionId,
        ply: u32,
        mover: Color,
        uci: String,
        san: String,
        fen: String,
        turn: Color,
    },
    PlayerDisconnected {
        session_id: SessionId,
        player: PlayerId,
    },
    Completed {
        session_id: SessionId,
        result: GameResult,
        winner: Option<PlayerId>,
        reason: Termination,
        persisted: bool,
    },
}

impl SessionEvent {
    pub fn move_accepted(session_id: SessionId, record: &MoveRecord) -> Self {
        SessionEvent::MoveAccepted {
            session_id,
            ply: record.ply,
            mover: record.color,
            uci: record.uci.clone(),
            san: record.san.clone(),
            fen: record.fen_after.clone(),
            turn: record.color.opposite(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::Completed { .. })
    }
}
