//! Process-wide registry of live sessions
//!
//! The registry's map is the one piece of shared mutable state in the
//! server. Mutation happens under the write half of a reader-writer lock;
//! enumeration takes the read half and may run concurrently with inserts.
//! Removal closes the underlying connection while the write lock is held,
//! so teardown is atomic with respect to the registry and a concurrent
//! failure notification for the same session finds nothing and no-ops.

use super::{EchoSession, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Thread-safe collection of live sessions
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<EchoSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. Sessions are created exactly once per negotiation, so
    /// no duplicate handling is needed.
    pub async fn register(&self, session: Arc<EchoSession>) {
        let id = session.id();
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, session);
        info!(session = %id, total = sessions.len(), "session registered");
    }

    /// Remove a session and release its connection.
    ///
    /// Idempotent: only the first removal for a given id has effect, later
    /// calls find nothing and return `false`.
    pub async fn remove_and_close(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.remove(&id) {
            Some(session) => {
                if let Err(e) = session.close().await {
                    warn!(session = %id, "error closing peer connection: {e}");
                }
                info!(session = %id, remaining = sessions.len(), "session removed");
                true
            }
            None => {
                debug!(session = %id, "session already removed");
                false
            }
        }
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Snapshot of live session handles, for diagnostics
    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().copied().collect()
    }
}
