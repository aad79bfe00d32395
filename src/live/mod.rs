//! Live games: rules adapter, session state machine, casual queue, persistence hand-off,
//! and the coordinator that ties them together.

mod coordinator;
mod events;
mod queue;
mod rules;
mod session;
mod store;

pub use coordinator::{CasualMatch, JoinAck, MatchCoordinator, MoveAck, Subscription};
pub use events::SessionEvent;
pub use queue::{MatchFound, MatchmakingQueue, QueueSlot, QueueTicket, WaitingPlayer};
pub use rules::{Board, PlayedMove, RulesError, Terminal};
pub use session::{
    GameOutcome, LiveSession, MoveRecord, Seating, SessionError, SessionId, SessionKind,
    SessionRecord, SessionSnapshot, SessionStatus, Termination,
};
pub use store::{InMemoryResultStore, JsonLinesResultStore, PersistGuard, ResultStore, StoreError};
