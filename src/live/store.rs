//! Persistence hand-off for finished games and final standings.
//!
//! The store itself is an external collaborator; this module only defines the seam,
//! two simple implementations, and the exactly-once guard used by the coordinator.

use crate::live::session::SessionRecord;
use crate::models::{Standing, TournamentId};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("result store unavailable: {0}")]
    Unavailable(String),
    #[error("result store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("result store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Where finished games and final standings go.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Called once per completed session (retried only after a failure).
    async fn persist_game_result(&self, record: &SessionRecord) -> Result<(), StoreError>;

    /// Called once when a tournament completes, with the final standings.
    async fn settle_ratings(
        &self,
        tournament_id: TournamentId,
        standings: &[Standing],
    ) -> Result<(), StoreError>;
}

/// Keeps everything in memory. Used by default and in tests.
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    records: Mutex<Vec<SessionRecord>>,
    settlements: Mutex<Vec<(TournamentId, Vec<Standing>)>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SessionRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn settlements(&self) -> Vec<(TournamentId, Vec<Standing>)> {
        self.settlements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn persist_game_result(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }

    async fn settle_ratings(
        &self,
        tournament_id: TournamentId,
        standings: &[Standing],
    ) -> Result<(), StoreError> {
        self.settlements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((tournament_id, standings.to_vec()));
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonLinesResultStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonLinesResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn append(&self, value: &serde_json::Value) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ResultStore for JsonLinesResultStore {
    async fn persist_game_result(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.append(&serde_json::json!({ "type": "game", "record": record }))
            .await
    }

    async fn settle_ratings(
        &self,
        tournament_id: TournamentId,
        standings: &[Standing],
    ) -> Result<(), StoreError> {
        self.append(&serde_json::json!({
            "type": "settlement",
            "tournament_id": tournament_id,
            "standings": standings,
        }))
        .await
    }
}

const PENDING: u8 = 0;
const IN_FLIGHT: u8 = 1;
const PERSISTED: u8 = 2;

/// Exactly-once guard for the persistence hand-off.
///
/// A caller must win `try_claim` before writing. Success commits the guard for good;
/// failure releases it so a later retry can claim it again.
#[derive(Debug, Default)]
pub struct PersistGuard(AtomicU8);

impl PersistGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_claim(&self) -> bool {
        self.0
            .compare_exchange(PENDING, IN_FLIGHT, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn commit(&self) {
        self.0.store(PERSISTED, Ordering::Release);
    }

    pub fn release(&self) {
        let _ = self
            .0
            .compare_exchange(IN_FLIGHT, PENDING, Ordering::AcqRel, Ordering::Acquire);
    }

    pub fn is_persisted(&self) -> bool {
        self.0.load(Ordering::Acquire) == PERSISTED
    }
}
