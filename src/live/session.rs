//! LiveSession: awaiting-players -> active -> completed.

use crate::live::events::SessionEvent;
use crate::live::rules::{Board, RulesError, Terminal};
use crate::models::{Color, GameId, GameResult, PlayerId, TournamentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A tournament session uses its pairing's game id.
pub type SessionId = GameId;

/// Errors returned to the caller of a session operation. None of them change session state.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound(SessionId),
    #[error("player is not in this session")]
    NotInSession,
    #[error("not your turn - it is {expected}'s turn")]
    NotYourTurn { expected: Color },
    #[error("{0}")]
    IllegalMove(#[from] RulesError),
    #[error("session has not started - waiting for both players")]
    NotStarted,
    #[error("session is already completed")]
    AlreadyCompleted,
    #[error("result is already persisted")]
    AlreadyPersisted,
    #[error("session is not completed yet")]
    NotCompleted,
    #[error("a player cannot end the game by {0}")]
    NotDeclarable(Termination),
    #[error("declared winner does not match a {reason}")]
    WinnerMismatch { reason: Termination },
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    AwaitingPlayers,
    Active,
    Completed,
}

/// Where the session came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionKind {
    /// Paired by arrival order in the casual queue.
    Casual,
    /// Instantiated from a tournament pairing.
    Tournament { tournament_id: TournamentId },
}

/// Why a game ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Checkmate,
    Stalemate,
    Repetition,
    InsufficientMaterial,
    FiftyMoveRule,
    DrawAgreement,
    Resignation,
    /// A casual player disconnected; the opponent wins.
    Abandoned,
    /// The opponent never connected before the awaiting-players timeout.
    NoShow,
    /// Result entered out-of-band.
    Adjudication,
}

impl Termination {
    pub fn as_str(self) -> &'static str {
        match self {
            Termination::Checkmate => "checkmate",
            Termination::Stalemate => "stalemate",
            Termination::Repetition => "repetition",
            Termination::InsufficientMaterial => "insufficient_material",
            Termination::FiftyMoveRule => "fifty_move_rule",
            Termination::DrawAgreement => "draw_agreement",
            Termination::Resignation => "resignation",
            Termination::Abandoned => "abandoned",
            Termination::NoShow => "no_show",
            Termination::Adjudication => "adjudication",
        }
    }

    /// Winning colour (None for a draw) and reason for a rules-detected ending.
    pub fn decide(terminal: Terminal) -> (Option<Color>, Termination) {
        match terminal {
            Terminal::Checkmate { winner } => (Some(winner), Termination::Checkmate),
            Terminal::Stalemate => (None, Termination::Stalemate),
            Terminal::Repetition => (None, Termination::Repetition),
            Terminal::InsufficientMaterial => (None, Termination::InsufficientMaterial),
            Terminal::FiftyMoveRule => (None, Termination::FiftyMoveRule),
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// 1-based half-move number.
    pub ply: u32,
    pub color: Color,
    pub uci: String,
    pub san: String,
    pub fen_after: String,
    pub played_at: DateTime<Utc>,
}

/// One side of the board: who is expected there and whether they have taken the seat.
#[derive(Clone, Debug)]
struct Seat {
    identity: PlayerId,
    bound: bool,
    connected: bool,
}

impl Seat {
    fn expecting(identity: PlayerId) -> Self {
        Self {
            identity,
            bound: false,
            connected: false,
        }
    }

    fn seated(identity: PlayerId) -> Self {
        Self {
            identity,
            bound: true,
            connected: true,
        }
    }
}

/// Outcome of a finished session, handed to whoever tracks scores.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GameOutcome {
    pub session_id: SessionId,
    pub kind: SessionKind,
    pub result: GameResult,
    pub winner: Option<PlayerId>,
    pub reason: Termination,
}

/// What gets persisted when a session completes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub kind: SessionKind,
    pub white: PlayerId,
    pub black: PlayerId,
    pub result: GameResult,
    pub winner: Option<PlayerId>,
    pub reason: Termination,
    pub moves: Vec<MoveRecord>,
    pub final_fen: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
}

/// Read-only view for API responses.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub kind: SessionKind,
    pub status: SessionStatus,
    pub white: Option<PlayerId>,
    pub black: Option<PlayerId>,
    pub turn: Color,
    pub fen: String,
    pub moves: Vec<MoveRecord>,
    pub winner: Option<PlayerId>,
    pub reason: Option<Termination>,
    pub result_persisted: bool,
}

/// Seating result for `bind`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Seating {
    pub color: Color,
    pub status: SessionStatus,
    /// The seat was empty before this call.
    pub newly_seated: bool,
    /// This call moved the session from awaiting-players to active.
    pub started: bool,
}

/// Runtime state of one game.
#[derive(Debug)]
pub struct LiveSession {
    pub id: SessionId,
    pub kind: SessionKind,
    white: Seat,
    black: Seat,
    board: Board,
    status: SessionStatus,
    moves: Vec<MoveRecord>,
    winner: Option<Color>,
    termination: Option<Termination>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl LiveSession {
    /// Stub for a tournament pairing. Both seats wait for their identities to join.
    pub fn for_pairing(
        id: SessionId,
        tournament_id: TournamentId,
        white: PlayerId,
        black: PlayerId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind: SessionKind::Tournament { tournament_id },
            white: Seat::expecting(white),
            black: Seat::expecting(black),
            board: Board::new(),
            status: SessionStatus::AwaitingPlayers,
            moves: Vec::new(),
            winner: None,
            termination: None,
            created_at: now,
            started_at: None,
            ended_at: None,
        }
    }

    /// Casual game: both players are present, so it starts active.
    pub fn casual(id: SessionId, white: PlayerId, black: PlayerId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            kind: SessionKind::Casual,
            white: Seat::seated(white),
            black: Seat::seated(black),
            board: Board::new(),
            status: SessionStatus::Active,
            moves: Vec::new(),
            winner: None,
            termination: None,
            created_at: now,
            started_at: Some(now),
            ended_at: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn turn(&self) -> Color {
        self.board.turn()
    }

    pub fn fen(&self) -> String {
        self.board.fen()
    }

    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    pub fn winner(&self) -> Option<Color> {
        self.winner
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    fn seat(&self, color: Color) -> &Seat {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    fn seat_mut(&mut self, color: Color) -> &mut Seat {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    /// Identity seated on `color`, if they have joined.
    pub fn identity(&self, color: Color) -> Option<&PlayerId> {
        let seat = self.seat(color);
        seat.bound.then_some(&seat.identity)
    }

    /// Seated on `color` and still connected.
    pub fn is_present(&self, color: Color) -> bool {
        let seat = self.seat(color);
        seat.bound && seat.connected
    }

    /// Colour the identity was paired with (whether or not they have joined yet).
    pub fn color_of(&self, identity: &PlayerId) -> Option<Color> {
        if &self.white.identity == identity {
            Some(Color::White)
        } else if &self.black.identity == identity {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// Colour of a seated identity.
    fn bound_color(&self, identity: &PlayerId) -> Option<Color> {
        self.color_of(identity).filter(|&c| self.seat(c).bound)
    }

    pub fn is_participant(&self, identity: &PlayerId) -> bool {
        self.bound_color(identity).is_some()
    }

    pub fn winner_identity(&self) -> Option<&PlayerId> {
        self.winner.map(|c| &self.seat(c).identity)
    }

    /// Seat `identity` on the side it was paired with. Joining twice is a no-op,
    /// and a reconnect after a disconnect just marks the seat connected again.
    pub fn bind(&mut self, identity: &PlayerId, now: DateTime<Utc>) -> Result<Seating, SessionError> {
        let color = self.color_of(identity).ok_or(SessionError::NotInSession)?;
        let status = self.status;
        let seat = self.seat_mut(color);
        let newly_seated = !seat.bound;
        seat.bound = true;
        seat.connected = true;

        let started = status == SessionStatus::AwaitingPlayers && self.white.bound && self.black.bound;
        if started {
            self.status = SessionStatus::Active;
            self.started_at = Some(now);
        }
        Ok(Seating {
            color,
            status: self.status,
            newly_seated,
            started,
        })
    }

    /// Mark a seated identity as disconnected. Returns its colour if it was connected.
    pub fn disconnect(&mut self, identity: &PlayerId) -> Option<Color> {
        let color = self.bound_color(identity)?;
        let seat = self.seat_mut(color);
        if !seat.connected {
            return None;
        }
        seat.connected = false;
        Some(color)
    }

    /// Validate and apply a move from `identity`. Nothing changes on error.
    pub fn apply_move(
        &mut self,
        identity: &PlayerId,
        uci: &str,
        now: DateTime<Utc>,
    ) -> Result<(MoveRecord, Option<Terminal>), SessionError> {
        match self.status {
            SessionStatus::Completed => return Err(SessionError::AlreadyCompleted),
            SessionStatus::AwaitingPlayers => return Err(SessionError::NotStarted),
            SessionStatus::Active => {}
        }
        let color = self.bound_color(identity).ok_or(SessionError::NotInSession)?;
        let turn = self.board.turn();
        if color != turn {
            return Err(SessionError::NotYourTurn { expected: turn });
        }

        let played = self.board.play(uci)?;
        let record = MoveRecord {
            ply: self.moves.len() as u32 + 1,
            color: played.mover,
            uci: played.uci,
            san: played.san,
            fen_after: played.fen,
            played_at: now,
        };
        self.moves.push(record.clone());
        Ok((record, self.board.terminal()))
    }

    /// Winner of an ending requested by a seated player, derived from the reason and the
    /// caller's colour. Rules-detected and administrative reasons are refused, as is a
    /// declared winner that disagrees with the derived one.
    pub fn forced_winner(
        &self,
        identity: &PlayerId,
        declared: Option<Color>,
        reason: Termination,
    ) -> Result<Option<Color>, SessionError> {
        let color = self.bound_color(identity).ok_or(SessionError::NotInSession)?;
        match self.status {
            SessionStatus::Completed => return Err(SessionError::AlreadyCompleted),
            SessionStatus::AwaitingPlayers => return Err(SessionError::NotStarted),
            SessionStatus::Active => {}
        }
        let winner = match reason {
            Termination::Resignation | Termination::Abandoned => Some(color.opposite()),
            Termination::DrawAgreement => None,
            other => return Err(SessionError::NotDeclarable(other)),
        };
        if declared.is_some() && declared != winner {
            return Err(SessionError::WinnerMismatch { reason });
        }
        Ok(winner)
    }

    /// Move to completed. Only the first call has any effect; later calls return None.
    pub fn finish(
        &mut self,
        winner: Option<Color>,
        reason: Termination,
        now: DateTime<Utc>,
    ) -> Option<GameOutcome> {
        if self.status == SessionStatus::Completed {
            return None;
        }
        self.status = SessionStatus::Completed;
        self.winner = winner;
        self.termination = Some(reason);
        self.ended_at = Some(now);
        self.outcome()
    }

    /// The decided outcome, once completed.
    pub fn outcome(&self) -> Option<GameOutcome> {
        let reason = self.termination?;
        Some(GameOutcome {
            session_id: self.id,
            kind: self.kind,
            result: GameResult::from_winner(self.winner),
            winner: self.winner_identity().cloned(),
            reason,
        })
    }

    /// The record handed to the result store. Only available once completed.
    pub fn record(&self) -> Option<SessionRecord> {
        let reason = self.termination?;
        Some(SessionRecord {
            session_id: self.id,
            kind: self.kind,
            white: self.white.identity.clone(),
            black: self.black.identity.clone(),
            result: GameResult::from_winner(self.winner),
            winner: self.winner_identity().cloned(),
            reason,
            moves: self.moves.clone(),
            final_fen: self.board.fen(),
            started_at: self.started_at,
            ended_at: self.ended_at.unwrap_or(self.created_at),
        })
    }

    pub fn completed_event(&self, persisted: bool) -> Option<SessionEvent> {
        let reason = self.termination?;
        Some(SessionEvent::Completed {
            session_id: self.id,
            result: GameResult::from_winner(self.winner),
            winner: self.winner_identity().cloned(),
            reason,
            persisted,
        })
    }

    pub fn snapshot(&self, result_persisted: bool) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            kind: self.kind,
            status: self.status,
            white: self.identity(Color::White).cloned(),
            black: self.identity(Color::Black).cloned(),
            turn: self.board.turn(),
            fen: self.board.fen(),
            moves: self.moves.clone(),
            winner: self.winner_identity().cloned(),
            reason: self.termination,
            result_persisted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn pairing_session() -> LiveSession {
        LiveSession::for_pairing(
            Uuid::new_v4(),
            Uuid::new_v4(),
            PlayerId::new("alice"),
            PlayerId::new("bob"),
            Utc::now(),
        )
    }

    #[test]
    fn binds_by_identity_not_arrival_order() {
        let mut s = pairing_session();
        let seat = s.bind(&PlayerId::new("bob"), Utc::now()).unwrap();
        assert_eq!(seat.color, Color::Black);
        assert_eq!(seat.status, SessionStatus::AwaitingPlayers);
        assert!(!seat.started);

        let again = s.bind(&PlayerId::new("bob"), Utc::now()).unwrap();
        assert_eq!(again.status, SessionStatus::AwaitingPlayers);
        assert!(!again.newly_seated);

        let seat = s.bind(&PlayerId::new("alice"), Utc::now()).unwrap();
        assert_eq!(seat.color, Color::White);
        assert!(seat.started);
        assert_eq!(s.status(), SessionStatus::Active);
    }

    #[test]
    fn stranger_cannot_bind() {
        let mut s = pairing_session();
        assert_eq!(
            s.bind(&PlayerId::new("mallory"), Utc::now()),
            Err(SessionError::NotInSession)
        );
    }

    #[test]
    fn moves_rejected_until_both_seated() {
        let mut s = pairing_session();
        s.bind(&PlayerId::new("alice"), Utc::now()).unwrap();
        assert_eq!(
            s.apply_move(&PlayerId::new("alice"), "e2e4", Utc::now()).unwrap_err(),
            SessionError::NotStarted
        );
    }

    #[test]
    fn forced_winner_follows_the_caller() {
        let mut s = pairing_session();
        let (alice, bob) = (PlayerId::new("alice"), PlayerId::new("bob"));
        s.bind(&alice, Utc::now()).unwrap();
        assert_eq!(
            s.forced_winner(&alice, None, Termination::Resignation),
            Err(SessionError::NotStarted)
        );

        s.bind(&bob, Utc::now()).unwrap();
        assert_eq!(
            s.forced_winner(&alice, None, Termination::Resignation),
            Ok(Some(Color::Black))
        );
        assert_eq!(
            s.forced_winner(&bob, Some(Color::White), Termination::Abandoned),
            Ok(Some(Color::White))
        );
        assert_eq!(s.forced_winner(&bob, None, Termination::DrawAgreement), Ok(None));
        assert_eq!(
            s.forced_winner(&alice, Some(Color::White), Termination::DrawAgreement),
            Err(SessionError::WinnerMismatch {
                reason: Termination::DrawAgreement
            })
        );
        for reason in [
            Termination::Checkmate,
            Termination::Stalemate,
            Termination::Repetition,
            Termination::NoShow,
            Termination::Adjudication,
        ] {
            assert_eq!(
                s.forced_winner(&alice, Some(Color::White), reason),
                Err(SessionError::NotDeclarable(reason))
            );
        }
    }

    #[test]
    fn finish_only_once() {
        let mut s = pairing_session();
        let first = s.finish(Some(Color::White), Termination::Resignation, Utc::now());
        assert!(first.is_some());
        assert!(s.finish(None, Termination::DrawAgreement, Utc::now()).is_none());
        assert_eq!(s.termination(), Some(Termination::Resignation));
        assert_eq!(s.winner_identity(), Some(&PlayerId::new("alice")));
    }
}
