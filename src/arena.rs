//! Arena: the operations exposed to the surrounding application.
//!
//! Tournaments are kept one per async mutex, so results for one tournament are
//! aggregated strictly one after another while different tournaments never contend.
//! Terminal live results flow from the match coordinator into the owning tournament,
//! and a completed round schedules the next one after `round_advance_delay`.
//! Force-completing the tournament aborts that pending advance.

use crate::config::ArenaConfig;
use crate::live::{
    CasualMatch, GameOutcome, InMemoryResultStore, JoinAck, JsonLinesResultStore,
    MatchCoordinator, MoveAck, ResultStore, SessionError, SessionEvent, SessionId, SessionKind,
    SessionSnapshot, StoreError, Termination,
};
use crate::logic::{self, RoundCompletion};
use crate::models::{
    Color, GameId, GameResult, Pairing, ParticipantId, PlayerId, Standing, Tournament,
    TournamentError, TournamentId,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error(transparent)]
    Tournament(#[from] TournamentError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("tournament not found")]
    TournamentNotFound(TournamentId),
    #[error("game not found")]
    GameNotFound(GameId),
}

struct TournamentEntry {
    tournament: Tournament,
    pending_advance: Option<JoinHandle<()>>,
}

impl TournamentEntry {
    fn cancel_advance(&mut self) {
        if let Some(handle) = self.pending_advance.take() {
            handle.abort();
            log::warn!(
                "Tournament {}: pending round advance cancelled",
                self.tournament.id
            );
        }
    }
}

struct Inner {
    config: ArenaConfig,
    tournaments: RwLock<HashMap<TournamentId, Arc<Mutex<TournamentEntry>>>>,
    /// Which tournament a game belongs to, for tournaments still in play.
    games: RwLock<HashMap<GameId, TournamentId>>,
    coordinator: MatchCoordinator,
    store: Arc<dyn ResultStore>,
}

/// Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Arena {
    inner: Arc<Inner>,
}

impl Arena {
    /// Uses a JSON-lines store when `results_path` is set, otherwise keeps results in memory.
    pub fn new(config: ArenaConfig) -> Self {
        let store: Arc<dyn ResultStore> = match &config.results_path {
            Some(path) => {
                log::info!("Persisting results to {}", path.display());
                Arc::new(JsonLinesResultStore::new(path.clone()))
            }
            None => Arc::new(InMemoryResultStore::new()),
        };
        Self::with_store(config, store)
    }

    pub fn with_store(config: ArenaConfig, store: Arc<dyn ResultStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                coordinator: MatchCoordinator::new(store.clone(), config.clone()),
                config,
                tournaments: RwLock::new(HashMap::new()),
                games: RwLock::new(HashMap::new()),
                store,
            }),
        }
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.inner.config
    }

    pub fn coordinator(&self) -> &MatchCoordinator {
        &self.inner.coordinator
    }

    fn entry(&self, id: TournamentId) -> Result<Arc<Mutex<TournamentEntry>>, ArenaError> {
        self.inner
            .tournaments
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
            .ok_or(ArenaError::TournamentNotFound(id))
    }

    fn tournament_of(&self, game_id: GameId) -> Result<TournamentId, ArenaError> {
        self.inner
            .games
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&game_id)
            .copied()
            .ok_or(ArenaError::GameNotFound(game_id))
    }

    // ---- tournaments ----

    pub fn create_tournament(&self, name: impl Into<String>) -> Tournament {
        let tournament = Tournament::new(name);
        log::info!("Created tournament {} ({})", tournament.id, tournament.name);
        self.inner
            .tournaments
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                tournament.id,
                Arc::new(Mutex::new(TournamentEntry {
                    tournament: tournament.clone(),
                    pending_advance: None,
                })),
            );
        tournament
    }

    pub fn tournament_ids(&self) -> Vec<TournamentId> {
        self.inner
            .tournaments
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect()
    }

    pub async fn tournament(&self, id: TournamentId) -> Result<Tournament, ArenaError> {
        let entry = self.entry(id)?;
        let guard = entry.lock().await;
        Ok(guard.tournament.clone())
    }

    pub async fn register(
        &self,
        id: TournamentId,
        player_id: PlayerId,
        rating: i32,
    ) -> Result<ParticipantId, ArenaError> {
        let entry = self.entry(id)?;
        let mut guard = entry.lock().await;
        Ok(logic::register_participant(
            &mut guard.tournament,
            player_id,
            rating,
        )?)
    }

    pub async fn import_roster_csv(
        &self,
        id: TournamentId,
        csv: &[u8],
    ) -> Result<usize, ArenaError> {
        let entry = self.entry(id)?;
        let mut guard = entry.lock().await;
        Ok(logic::import_roster_csv(&mut guard.tournament, csv)?)
    }

    /// Registration -> Active, then pair round 1.
    pub async fn start_tournament(&self, id: TournamentId) -> Result<Vec<Pairing>, ArenaError> {
        let entry = self.entry(id)?;
        let mut guard = entry.lock().await;
        logic::start_tournament(&mut guard.tournament)?;
        self.open_round(&mut guard, 1)
    }

    /// Start round `number` by hand. Replaces any scheduled advance.
    pub async fn start_round(
        &self,
        id: TournamentId,
        number: u32,
    ) -> Result<Vec<Pairing>, ArenaError> {
        let entry = self.entry(id)?;
        let mut guard = entry.lock().await;
        let pairings = self.open_round(&mut guard, number)?;
        guard.cancel_advance();
        Ok(pairings)
    }

    /// Close round `number`. Schedules the next round, or completes the tournament
    /// and settles ratings when it was the last.
    pub async fn complete_round(
        &self,
        id: TournamentId,
        number: u32,
    ) -> Result<RoundCompletion, ArenaError> {
        let entry = self.entry(id)?;
        let mut guard = entry.lock().await;
        let completion = logic::complete_round(&mut guard.tournament, number)?;
        let settlement = self.after_round(&mut guard, completion);
        drop(guard);
        if let Some(standings) = settlement {
            self.settle(id, &standings).await;
        }
        Ok(completion)
    }

    /// End the tournament now. A scheduled round advance is cancelled first.
    pub async fn complete_tournament(&self, id: TournamentId) -> Result<Vec<Standing>, ArenaError> {
        let entry = self.entry(id)?;
        let mut guard = entry.lock().await;
        logic::complete_tournament(&mut guard.tournament)?;
        guard.cancel_advance();
        let standings = logic::standings(&guard.tournament);
        drop(guard);
        self.settle(id, &standings).await;
        Ok(standings)
    }

    pub async fn standings(&self, id: TournamentId) -> Result<Vec<Standing>, ArenaError> {
        let entry = self.entry(id)?;
        let guard = entry.lock().await;
        Ok(logic::standings(&guard.tournament))
    }

    /// Pairings of the current round; empty before round 1.
    pub async fn current_pairings(&self, id: TournamentId) -> Result<Vec<Pairing>, ArenaError> {
        let entry = self.entry(id)?;
        let guard = entry.lock().await;
        Ok(guard
            .tournament
            .current()
            .map(|r| r.pairings.clone())
            .unwrap_or_default())
    }

    /// True while a round advance is scheduled and has not fired.
    pub async fn has_pending_advance(&self, id: TournamentId) -> Result<bool, ArenaError> {
        let entry = self.entry(id)?;
        let guard = entry.lock().await;
        Ok(guard
            .pending_advance
            .as_ref()
            .is_some_and(|h| !h.is_finished()))
    }

    /// Record a result reported out-of-band. If the game has a live session it is
    /// adjudicated, so the session completes and is persisted like any other ending.
    /// `winner`, when given, must be the identity the result makes the winner.
    pub async fn submit_game_result(
        &self,
        game_id: GameId,
        result: GameResult,
        winner: Option<PlayerId>,
    ) -> Result<(), ArenaError> {
        let tournament_id = self.tournament_of(game_id)?;
        {
            let entry = self.entry(tournament_id)?;
            let guard = entry.lock().await;
            let t = &guard.tournament;
            let pairing = t
                .current()
                .and_then(|r| r.pairing(game_id))
                .ok_or(TournamentError::GameNotFound(game_id))?;
            if pairing.is_resolved() {
                return Err(TournamentError::ResultAlreadyRecorded(game_id).into());
            }
            if let Some(declared) = &winner {
                let expected = result
                    .winner()
                    .map(|c| match c {
                        Color::White => pairing.white,
                        Color::Black => pairing.black,
                    })
                    .and_then(|pid| t.participant(pid))
                    .map(|p| &p.player_id);
                if expected != Some(declared) {
                    return Err(TournamentError::WinnerMismatch.into());
                }
            }
        }

        if self.inner.coordinator.contains(game_id)
            && self.inner.coordinator.adjudicate(game_id, result).await?.is_none()
        {
            // The live game ended first; its own result stands.
            return Err(TournamentError::ResultAlreadyRecorded(game_id).into());
        }
        self.record_result(tournament_id, game_id, result).await
    }

    // ---- live games ----

    pub fn enqueue_casual(&self, identity: &PlayerId) -> CasualMatch {
        self.inner.coordinator.enqueue_casual(identity)
    }

    pub fn leave_queue(&self, identity: &PlayerId) -> bool {
        self.inner.coordinator.leave_queue(identity)
    }

    pub async fn join_tournament_session(
        &self,
        session_id: SessionId,
        identity: &PlayerId,
    ) -> Result<JoinAck, ArenaError> {
        Ok(self.inner.coordinator.join(session_id, identity).await?)
    }

    pub async fn submit_move(
        &self,
        session_id: SessionId,
        identity: &PlayerId,
        uci: &str,
    ) -> Result<MoveAck, ArenaError> {
        let ack = self
            .inner
            .coordinator
            .submit_move(session_id, identity, uci)
            .await?;
        if let Some(outcome) = &ack.completed {
            self.forward(outcome).await;
        }
        Ok(ack)
    }

    pub async fn force_end(
        &self,
        session_id: SessionId,
        identity: &PlayerId,
        winner: Option<Color>,
        reason: Termination,
    ) -> Result<Option<GameOutcome>, ArenaError> {
        let outcome = self
            .inner
            .coordinator
            .force_end(session_id, identity, winner, reason)
            .await?;
        if let Some(outcome) = &outcome {
            self.forward(outcome).await;
        }
        Ok(outcome)
    }

    pub async fn disconnect(&self, identity: &PlayerId) -> Vec<GameOutcome> {
        let outcomes = self.inner.coordinator.disconnect(identity).await;
        for outcome in &outcomes {
            self.forward(outcome).await;
        }
        outcomes
    }

    pub async fn next_event(
        &self,
        session_id: SessionId,
        after_ply: u32,
        wait: Duration,
    ) -> Result<Option<SessionEvent>, ArenaError> {
        Ok(self
            .inner
            .coordinator
            .next_event(session_id, after_ply, wait)
            .await?)
    }

    pub async fn session_snapshot(
        &self,
        session_id: SessionId,
    ) -> Result<SessionSnapshot, ArenaError> {
        Ok(self.inner.coordinator.snapshot(session_id).await?)
    }

    pub async fn retry_persist(&self, session_id: SessionId) -> Result<bool, ArenaError> {
        Ok(self.inner.coordinator.retry_persist(session_id).await?)
    }

    /// Periodic housekeeping; no-show forfeits are scored like any other result.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Vec<GameOutcome> {
        let outcomes = self.inner.coordinator.sweep(now).await;
        for outcome in &outcomes {
            self.forward(outcome).await;
        }
        outcomes
    }

    // ---- internals ----

    /// Pair round `number` and create a live session for every non-bye pairing.
    fn open_round(
        &self,
        entry: &mut TournamentEntry,
        number: u32,
    ) -> Result<Vec<Pairing>, ArenaError> {
        let t = &mut entry.tournament;
        let pairings = logic::start_round(t, number)?;
        let mut games = self.inner.games.write().unwrap_or_else(|e| e.into_inner());
        for p in &pairings {
            games.insert(p.game_id, t.id);
            if p.is_bye {
                continue;
            }
            let (Some(white), Some(black)) = (t.participant(p.white), t.participant(p.black))
            else {
                return Err(TournamentError::ParticipantNotFound(p.white).into());
            };
            self.inner.coordinator.open_tournament_session(
                p.game_id,
                t.id,
                white.player_id.clone(),
                black.player_id.clone(),
            );
        }
        Ok(pairings)
    }

    /// Scored results of a finished tournament session go to its tournament.
    async fn forward(&self, outcome: &GameOutcome) {
        let SessionKind::Tournament { tournament_id } = outcome.kind else {
            return;
        };
        if let Err(e) = self
            .record_result(tournament_id, outcome.session_id, outcome.result)
            .await
        {
            log::warn!(
                "Result of game {} not applied to tournament {}: {}",
                outcome.session_id,
                tournament_id,
                e
            );
        }
    }

    async fn record_result(
        &self,
        tournament_id: TournamentId,
        game_id: GameId,
        result: GameResult,
    ) -> Result<(), ArenaError> {
        let entry = self.entry(tournament_id)?;
        let mut guard = entry.lock().await;
        let round = logic::apply_result(&mut guard.tournament, game_id, result)?;
        log::info!(
            "Tournament {}: game {} in round {} scored {:?}",
            tournament_id,
            game_id,
            round,
            result
        );
        let round_done = guard
            .tournament
            .round(round)
            .is_some_and(logic::is_round_complete);
        if !round_done {
            return Ok(());
        }
        let completion = logic::complete_round(&mut guard.tournament, round)?;
        let settlement = self.after_round(&mut guard, completion);
        drop(guard);
        if let Some(standings) = settlement {
            self.settle(tournament_id, &standings).await;
        }
        Ok(())
    }

    /// Schedule the next round, or return the final standings to settle.
    fn after_round(
        &self,
        entry: &mut TournamentEntry,
        completion: RoundCompletion,
    ) -> Option<Vec<Standing>> {
        match completion {
            RoundCompletion::NextRound(next) => {
                self.schedule_advance(entry, next);
                None
            }
            RoundCompletion::TournamentComplete => {
                entry.cancel_advance();
                Some(logic::standings(&entry.tournament))
            }
        }
    }

    fn schedule_advance(&self, entry: &mut TournamentEntry, next: u32) {
        entry.cancel_advance();
        let id = entry.tournament.id;
        let delay = self.inner.config.round_advance_delay;
        let arena = self.clone();
        log::info!(
            "Tournament {}: round {} starts in {:?}",
            id,
            next,
            delay
        );
        entry.pending_advance = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = arena.advance(id, next).await {
                log::warn!("Tournament {}: round {} did not start: {}", id, next, e);
            }
        }));
    }

    async fn advance(&self, id: TournamentId, next: u32) -> Result<(), ArenaError> {
        let entry = self.entry(id)?;
        let mut guard = entry.lock().await;
        // This task is the pending advance; forget it without aborting ourselves.
        guard.pending_advance = None;
        self.open_round(&mut guard, next).map(|_| ())
    }

    /// Final bookkeeping for a completed tournament: its games leave the index, then
    /// ratings are settled.
    async fn settle(&self, id: TournamentId, standings: &[Standing]) {
        {
            let mut games = self.inner.games.write().unwrap_or_else(|e| e.into_inner());
            let before = games.len();
            games.retain(|_, tournament| *tournament != id);
            log::debug!(
                "Tournament {}: dropped {} game(s) from the index",
                id,
                before - games.len()
            );
        }
        if let Err(e) = self.inner.store.settle_ratings(id, standings).await {
            log::error!("Tournament {}: rating settlement failed: {}", id, e);
        }
    }
}
