//! Swiss-system chess tournaments with live match coordination: library with models,
//! tournament logic, live game sessions, and the arena that ties them together.

pub mod arena;
pub mod config;
pub mod live;
pub mod logic;
pub mod models;

pub use arena::{Arena, ArenaError};
pub use config::ArenaConfig;
pub use live::{
    CasualMatch, GameOutcome, InMemoryResultStore, JoinAck, MatchCoordinator, MatchFound, MoveAck,
    ResultStore, SessionError, SessionEvent, SessionId, SessionKind, SessionStatus, StoreError,
    Termination,
};
pub use logic::{
    apply_result, compute_rounds, generate_pairings, is_round_complete, is_tournament_complete,
    standings, RoundCompletion,
};
pub use models::{
    Color, GameId, GameResult, Pairing, Participant, ParticipantId, PlayerId, Round, RoundStatus,
    Standing, Tournament, TournamentError, TournamentId, TournamentState,
};
