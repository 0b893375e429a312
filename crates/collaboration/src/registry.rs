/// Connected sessions and message delivery to them
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{CollaborationError, Result, SessionId};

/// Public view of a registered session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub peer: String,
    pub connected_at: DateTime<Utc>,
}

/// Registered session and the sending half of its outbound queue
struct SessionHandle {
    info: SessionInfo,
    tx: mpsc::Sender<String>,
    evicted: CancellationToken,
}

impl SessionHandle {
    fn evict(&self) {
        self.evicted.cancel();
    }
}

/// Membership list of live sessions.
///
/// Delivery never blocks: each session owns a bounded queue drained by its
/// writer task, and a session whose queue is full or closed is evicted. Dropping
/// the handle closes the queue and fires the session's eviction signal, which
/// ends that session's connection.
pub struct SessionRegistry {
    sessions: Mutex<Vec<SessionHandle>>,
    queue_capacity: usize,
}

impl SessionRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Add a session; the returned receiver yields every message addressed to it.
    pub fn register(&self, peer: impl Into<String>) -> (SessionId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let info = SessionInfo {
            id: SessionId::new(),
            peer: peer.into(),
            connected_at: Utc::now(),
        };
        let id = info.id;
        self.sessions.lock().push(SessionHandle {
            info,
            tx,
            evicted: CancellationToken::new(),
        });
        (id, rx)
    }

    /// Signal cancelled when `id` is evicted. Plain `unregister` never fires it.
    pub fn eviction_signal(&self, id: SessionId) -> Option<CancellationToken> {
        self.sessions
            .lock()
            .iter()
            .find(|s| s.info.id == id)
            .map(|s| s.evicted.clone())
    }

    pub fn unregister(&self, id: SessionId) -> Option<SessionInfo> {
        let mut sessions = self.sessions.lock();
        let idx = sessions.iter().position(|s| s.info.id == id)?;
        Some(sessions.remove(idx).info)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.lock().iter().any(|s| s.info.id == id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Registered sessions in connection order
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.sessions.lock().iter().map(|s| s.info.clone()).collect()
    }

    /// Queue `message` for a single session.
    pub fn send_to(&self, id: SessionId, message: String) -> Result<()> {
        let mut sessions = self.sessions.lock();
        let idx = sessions
            .iter()
            .position(|s| s.info.id == id)
            .ok_or(CollaborationError::SessionNotFound(id))?;

        match sessions[idx].tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(err) => {
                let handle = sessions.remove(idx);
                handle.evict();
                warn!(session = %id, peer = %handle.info.peer, "evicting session");
                Err(match err {
                    TrySendError::Full(_) => CollaborationError::SessionLagging(id),
                    TrySendError::Closed(_) => CollaborationError::SessionClosed(id),
                })
            }
        }
    }

    /// Queue `message` for every session, evicting those that cannot take it.
    /// Returns the number of sessions the message was queued for.
    pub fn broadcast(&self, message: &str) -> usize {
        let mut sessions = self.sessions.lock();
        sessions.retain(|handle| match handle.tx.try_send(message.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(session = %handle.info.id, peer = %handle.info.peer, "session lagging, evicting");
                handle.evict();
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(session = %handle.info.id, "session closed, removing");
                handle.evict();
                false
            }
        });

        sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(crate::DEFAULT_OUTBOUND_QUEUE)
    }
}
