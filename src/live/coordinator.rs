//! MatchCoordinator: owns every live session, serializes mutations per session,
//! broadcasts events, and hands finished games to the result store exactly once.
//!
//! Each session sits behind its own async mutex, so two moves for the same session
//! are applied one after the other while different sessions proceed in parallel.
//! The session map itself is only locked long enough to look up or insert a handle.

use crate::config::ArenaConfig;
use crate::live::events::SessionEvent;
use crate::live::queue::{MatchFound, MatchmakingQueue, QueueSlot, QueueTicket};
use crate::live::rules::Board;
use crate::live::session::{
    GameOutcome, LiveSession, MoveRecord, SessionError, SessionId, SessionKind, SessionSnapshot,
    SessionStatus, Termination,
};
use crate::live::store::{PersistGuard, ResultStore};
use crate::models::{Color, GameResult, PlayerId, TournamentId};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
struct SessionHandle {
    state: Arc<Mutex<LiveSession>>,
    events: broadcast::Sender<SessionEvent>,
    persist: Arc<PersistGuard>,
}

/// Reply to a casual queue request.
#[derive(Debug)]
pub enum CasualMatch {
    /// Nobody was waiting. The ticket resolves once an opponent arrives.
    Waiting(QueueTicket),
    Matched(MatchFound),
}

/// Reply to a tournament join.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct JoinAck {
    pub color: Color,
    pub status: SessionStatus,
}

/// Reply to an accepted move.
#[derive(Clone, Debug)]
pub struct MoveAck {
    pub record: MoveRecord,
    /// Side to move next.
    pub turn: Color,
    /// Set when this move ended the game.
    pub completed: Option<GameOutcome>,
}

/// Live feed for a session. `final_event` is set when the session had already completed
/// at subscription time, so late spectators still see the result.
pub struct Subscription {
    pub final_event: Option<SessionEvent>,
    pub events: broadcast::Receiver<SessionEvent>,
}

pub struct MatchCoordinator {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    queue: MatchmakingQueue,
    store: Arc<dyn ResultStore>,
    config: ArenaConfig,
}

fn chrono_span(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::weeks(52))
}

impl MatchCoordinator {
    pub fn new(store: Arc<dyn ResultStore>, config: ArenaConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            queue: MatchmakingQueue::new(),
            store,
            config,
        }
    }

    fn handle(&self, id: SessionId) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    fn handles(&self) -> Vec<SessionHandle> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    fn insert(&self, session: LiveSession) -> SessionHandle {
        let id = session.id;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let handle = SessionHandle {
            state: Arc::new(Mutex::new(session)),
            events,
            persist: Arc::new(PersistGuard::new()),
        };
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, handle.clone());
        handle
    }

    fn remove(&self, id: SessionId) {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Create the awaiting-players stub for a tournament pairing. The session id is the game id.
    pub fn open_tournament_session(
        &self,
        game_id: SessionId,
        tournament_id: TournamentId,
        white: PlayerId,
        black: PlayerId,
    ) {
        if self.contains(game_id) {
            return;
        }
        self.insert(LiveSession::for_pairing(
            game_id,
            tournament_id,
            white,
            black,
            Utc::now(),
        ));
    }

    /// Casual queue: pair with whoever is waiting, or wait.
    pub fn enqueue_casual(&self, identity: &PlayerId) -> CasualMatch {
        let waiting = match self.queue.take_or_park(identity) {
            QueueSlot::Parked(ticket) => return CasualMatch::Waiting(ticket),
            QueueSlot::Opponent(w) => w,
        };

        let waiting_is_white = rand::thread_rng().gen_bool(0.5);
        let (white, black) = if waiting_is_white {
            (waiting.identity.clone(), identity.clone())
        } else {
            (identity.clone(), waiting.identity.clone())
        };
        let session_id = Uuid::new_v4();
        let handle = self.insert(LiveSession::casual(
            session_id,
            white.clone(),
            black.clone(),
            Utc::now(),
        ));

        let opponent = waiting.identity.clone();
        let arriving_color = if waiting_is_white {
            Color::Black
        } else {
            Color::White
        };
        let notified = waiting.notify(MatchFound {
            session_id,
            color: arriving_color.opposite(),
            opponent: identity.clone(),
        });
        if !notified {
            log::warn!("{} left the queue before being matched", opponent);
            self.remove(session_id);
            return self.enqueue_casual(identity);
        }

        log::info!(
            "Casual session {} matched: {} (white) vs {} (black)",
            session_id,
            white,
            black
        );
        let _ = handle.events.send(SessionEvent::Matched {
            session_id,
            white,
            black,
            fen: Board::new().fen(),
        });
        CasualMatch::Matched(MatchFound {
            session_id,
            color: arriving_color,
            opponent,
        })
    }

    /// Leave the casual queue. True if the player was waiting.
    pub fn leave_queue(&self, identity: &PlayerId) -> bool {
        self.queue.remove(identity)
    }

    /// Seat `identity` in a pre-created session, by the identity it was paired with.
    pub async fn join(&self, id: SessionId, identity: &PlayerId) -> Result<JoinAck, SessionError> {
        let handle = self.handle(id)?;
        let mut session = handle.state.lock().await;
        let seating = session.bind(identity, Utc::now())?;

        if seating.started {
            if let (Some(white), Some(black)) = (
                session.identity(Color::White).cloned(),
                session.identity(Color::Black).cloned(),
            ) {
                log::info!("Session {} active: {} vs {}", id, white, black);
                let _ = handle.events.send(SessionEvent::Matched {
                    session_id: id,
                    white,
                    black,
                    fen: session.fen(),
                });
            }
        } else if seating.newly_seated && seating.status == SessionStatus::AwaitingPlayers {
            let _ = handle.events.send(SessionEvent::Waiting {
                session_id: id,
                seated: identity.clone(),
                color: seating.color,
            });
        }
        Ok(JoinAck {
            color: seating.color,
            status: seating.status,
        })
    }

    /// Validate and apply a move. On a terminal position the session completes and the
    /// result is persisted before the completion event goes out.
    pub async fn submit_move(
        &self,
        id: SessionId,
        identity: &PlayerId,
        uci: &str,
    ) -> Result<MoveAck, SessionError> {
        let handle = self.handle(id)?;
        let mut session = handle.state.lock().await;
        let (record, terminal) = session.apply_move(identity, uci, Utc::now())?;
        let turn = session.turn();

        let _ = handle.events.send(SessionEvent::move_accepted(id, &record));

        let completed = match terminal {
            Some(t) => {
                let (winner, reason) = Termination::decide(t);
                self.conclude(&handle, &mut session, winner, reason).await
            }
            None => None,
        };
        Ok(MoveAck {
            record,
            turn,
            completed,
        })
    }

    /// Out-of-band ending requested by a seated player: resignation, agreed draw or
    /// abandonment. The winner follows from the reason and the caller's colour; a
    /// `declared` winner is only checked against it. Returns None when the session had
    /// already completed: the first ending wins.
    pub async fn force_end(
        &self,
        id: SessionId,
        identity: &PlayerId,
        declared: Option<Color>,
        reason: Termination,
    ) -> Result<Option<GameOutcome>, SessionError> {
        let handle = self.handle(id)?;
        let mut session = handle.state.lock().await;
        if !session.is_participant(identity) {
            return Err(SessionError::NotInSession);
        }
        if session.status() == SessionStatus::Completed {
            return Ok(None);
        }
        let winner = session.forced_winner(identity, declared, reason)?;
        Ok(self.conclude(&handle, &mut session, winner, reason).await)
    }

    /// Administrative ending with a known result. No-op if already completed.
    pub async fn adjudicate(
        &self,
        id: SessionId,
        result: GameResult,
    ) -> Result<Option<GameOutcome>, SessionError> {
        let handle = self.handle(id)?;
        let mut session = handle.state.lock().await;
        Ok(self
            .conclude(&handle, &mut session, result.winner(), Termination::Adjudication)
            .await)
    }

    /// Complete the session (first caller only), persist, then broadcast completion.
    async fn conclude(
        &self,
        handle: &SessionHandle,
        session: &mut LiveSession,
        winner: Option<Color>,
        reason: Termination,
    ) -> Option<GameOutcome> {
        let outcome = session.finish(winner, reason, Utc::now())?;
        log::info!(
            "Session {} completed: {:?} by {}",
            session.id,
            outcome.result,
            reason
        );
        let persisted = self.persist(handle, session).await;
        if let Some(event) = session.completed_event(persisted) {
            let _ = handle.events.send(event);
        }
        Some(outcome)
    }

    /// Hand the record to the store. Only one caller at a time can hold the guard; it is
    /// committed on success and released on failure so a later retry can try again.
    async fn persist(&self, handle: &SessionHandle, session: &LiveSession) -> bool {
        let Some(record) = session.record() else {
            return false;
        };
        if !handle.persist.try_claim() {
            return handle.persist.is_persisted();
        }
        let attempts = self.config.persist_attempts.max(1);
        for attempt in 1..=attempts {
            match self.store.persist_game_result(&record).await {
                Ok(()) => {
                    handle.persist.commit();
                    return true;
                }
                Err(e) => {
                    log::warn!(
                        "Persisting session {} failed (attempt {}/{}): {}",
                        session.id,
                        attempt,
                        attempts,
                        e
                    );
                    if attempt < attempts {
                        tokio::time::sleep(self.config.persist_backoff * attempt).await;
                    }
                }
            }
        }
        log::error!(
            "Session {} result not persisted after {} attempt(s); will retry",
            session.id,
            attempts
        );
        handle.persist.release();
        false
    }

    /// Retry the hand-off for a completed session whose earlier attempts failed.
    pub async fn retry_persist(&self, id: SessionId) -> Result<bool, SessionError> {
        let handle = self.handle(id)?;
        let session = handle.state.lock().await;
        if session.status() != SessionStatus::Completed {
            return Err(SessionError::NotCompleted);
        }
        if handle.persist.is_persisted() {
            return Err(SessionError::AlreadyPersisted);
        }
        let persisted = self.persist(&handle, &session).await;
        if persisted {
            if let Some(event) = session.completed_event(true) {
                let _ = handle.events.send(event);
            }
        }
        Ok(persisted)
    }

    /// A player's connection dropped. They leave the casual queue; casual games are
    /// forfeited to the opponent; tournament games only notify so a reconnect can rebind.
    pub async fn disconnect(&self, identity: &PlayerId) -> Vec<GameOutcome> {
        if self.queue.remove(identity) {
            log::info!("{} left the casual queue", identity);
        }
        let mut outcomes = Vec::new();
        for handle in self.handles() {
            let mut session = handle.state.lock().await;
            if session.status() == SessionStatus::Completed {
                continue;
            }
            let Some(color) = session.disconnect(identity) else {
                continue;
            };
            log::warn!("{} disconnected from session {}", identity, session.id);
            let _ = handle.events.send(SessionEvent::PlayerDisconnected {
                session_id: session.id,
                player: identity.clone(),
            });
            if session.kind == SessionKind::Casual {
                if let Some(outcome) = self
                    .conclude(&handle, &mut session, Some(color.opposite()), Termination::Abandoned)
                    .await
                {
                    outcomes.push(outcome);
                }
            }
        }
        outcomes
    }

    /// Subscribe to a session's events. Completed sessions also return their final event.
    pub async fn subscribe(&self, id: SessionId) -> Result<Subscription, SessionError> {
        let handle = self.handle(id)?;
        let events = handle.events.subscribe();
        let session = handle.state.lock().await;
        let final_event = session.completed_event(handle.persist.is_persisted());
        Ok(Subscription {
            final_event,
            events,
        })
    }

    /// Next event for a client that has seen every move up to `after_ply`. Moves it
    /// missed are replayed from the session's history in order, and a completed session
    /// answers with its final event; only an up-to-date client waits on the live feed.
    /// Returns None when nothing happened within `wait`.
    pub async fn next_event(
        &self,
        id: SessionId,
        after_ply: u32,
        wait: Duration,
    ) -> Result<Option<SessionEvent>, SessionError> {
        let handle = self.handle(id)?;
        // Subscribe before reading history so nothing lands in between.
        let mut events = handle.events.subscribe();
        if let Some(event) = self.catch_up(&handle, after_ply).await {
            return Ok(Some(event));
        }

        let deadline = Instant::now() + wait;
        loop {
            match tokio::time::timeout_at(deadline, events.recv()).await {
                Err(_) | Ok(Err(RecvError::Closed)) => return Ok(None),
                Ok(Ok(SessionEvent::MoveAccepted { ply, .. })) if ply <= after_ply => continue,
                Ok(Ok(event)) => return Ok(Some(event)),
                Ok(Err(RecvError::Lagged(skipped))) => {
                    log::debug!("Session {}: poller lagged by {} event(s)", id, skipped);
                    if let Some(event) = self.catch_up(&handle, after_ply).await {
                        return Ok(Some(event));
                    }
                }
            }
        }
    }

    async fn catch_up(&self, handle: &SessionHandle, after_ply: u32) -> Option<SessionEvent> {
        let session = handle.state.lock().await;
        if let Some(record) = session.moves().get(after_ply as usize) {
            return Some(SessionEvent::move_accepted(session.id, record));
        }
        session.completed_event(handle.persist.is_persisted())
    }

    pub async fn snapshot(&self, id: SessionId) -> Result<SessionSnapshot, SessionError> {
        let handle = self.handle(id)?;
        let session = handle.state.lock().await;
        Ok(session.snapshot(handle.persist.is_persisted()))
    }

    /// Housekeeping, meant to run periodically:
    /// - retry persistence for completed sessions that are still unpersisted;
    /// - evict persisted sessions whose retention window has passed;
    /// - forfeit tournament sessions stuck awaiting players past the timeout to the side
    ///   that joined and is still connected. Sessions with nobody present are left for
    ///   an administrator.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Vec<GameOutcome> {
        let retention = chrono_span(self.config.session_retention);
        let awaiting_timeout = chrono_span(self.config.awaiting_timeout);
        let mut outcomes = Vec::new();
        let mut expired = Vec::new();

        for handle in self.handles() {
            let mut session = handle.state.lock().await;
            match session.status() {
                SessionStatus::Completed => {
                    if !handle.persist.is_persisted() {
                        self.persist(&handle, &session).await;
                    }
                    let ended = session.ended_at.unwrap_or(session.created_at);
                    if handle.persist.is_persisted() && ended + retention <= now {
                        expired.push(session.id);
                    }
                }
                SessionStatus::AwaitingPlayers if session.created_at + awaiting_timeout <= now => {
                    let white_here = session.is_present(Color::White);
                    let black_here = session.is_present(Color::Black);
                    let winner = match (white_here, black_here) {
                        (true, false) => Color::White,
                        (false, true) => Color::Black,
                        _ => {
                            log::debug!("Session {} has no players after timeout", session.id);
                            continue;
                        }
                    };
                    log::warn!("Session {}: opponent never joined, forfeiting", session.id);
                    if let Some(outcome) = self
                        .conclude(&handle, &mut session, Some(winner), Termination::NoShow)
                        .await
                    {
                        outcomes.push(outcome);
                    }
                }
                _ => {}
            }
        }

        if !expired.is_empty() {
            let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
            for id in &expired {
                sessions.remove(id);
            }
            log::info!("Evicted {} completed session(s)", expired.len());
        }
        outcomes
    }
}
