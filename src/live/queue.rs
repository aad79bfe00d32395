//! Casual matchmaking: first come, first paired. At most one player waits at a time.

use crate::live::session::SessionId;
use crate::models::{Color, PlayerId};
use std::sync::Mutex;
use tokio::sync::oneshot;

/// Delivered to both players of a casual match.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize)]
pub struct MatchFound {
    pub session_id: SessionId,
    pub color: Color,
    pub opponent: PlayerId,
}

/// Held by a waiting player. Resolves when an opponent arrives; resolves to None if the
/// wait was cancelled (disconnect, or the same player queued again).
#[derive(Debug)]
pub struct QueueTicket {
    rx: oneshot::Receiver<MatchFound>,
}

impl QueueTicket {
    pub async fn matched(self) -> Option<MatchFound> {
        self.rx.await.ok()
    }
}

/// The player who was waiting, handed to the coordinator to build the session.
#[derive(Debug)]
pub struct WaitingPlayer {
    pub identity: PlayerId,
    notify: oneshot::Sender<MatchFound>,
}

impl WaitingPlayer {
    /// Tell the waiting player about the match. False if they stopped listening.
    pub fn notify(self, found: MatchFound) -> bool {
        self.notify.send(found).is_ok()
    }
}

pub enum QueueSlot {
    /// An opponent was waiting and has been taken off the queue.
    Opponent(WaitingPlayer),
    /// Nobody was waiting; the caller now is.
    Parked(QueueTicket),
}

#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    waiting: Mutex<Option<WaitingPlayer>>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the waiting opponent, or park `identity` if there is none.
    /// A waiter whose ticket was dropped is discarded rather than matched.
    pub fn take_or_park(&self, identity: &PlayerId) -> QueueSlot {
        let mut waiting = self.waiting.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(w) = waiting.take() {
            if w.identity != *identity && !w.notify.is_closed() {
                return QueueSlot::Opponent(w);
            }
        }
        let (tx, rx) = oneshot::channel();
        *waiting = Some(WaitingPlayer {
            identity: identity.clone(),
            notify: tx,
        });
        log::info!("{} is searching for a casual opponent", identity);
        QueueSlot::Parked(QueueTicket { rx })
    }

    /// Remove `identity` from the queue. True if they were waiting.
    pub fn remove(&self, identity: &PlayerId) -> bool {
        let mut waiting = self.waiting.lock().unwrap_or_else(|e| e.into_inner());
        if waiting.as_ref().is_some_and(|w| &w.identity == identity) {
            *waiting = None;
            true
        } else {
            false
        }
    }

    pub fn is_waiting(&self, identity: &PlayerId) -> bool {
        self.waiting
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|w| &w.identity == identity && !w.notify.is_closed())
    }
}
