//! Per-browser session state
//!
//! A session remembers the tool used last and its most recent successful
//! result. Switching tools drops the result; a failed run leaves it alone.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pdfdesk_core::{Artifact, Tool};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug)]
struct Session {
    tool: Tool,
    result: Option<Arc<Artifact>>,
    last_used: Instant,
}

#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Prepare a session to run `tool`, creating it if needed.
    ///
    /// Idle sessions are evicted here, before the operation starts.
    pub async fn begin(&self, id: Option<Uuid>, tool: Tool) -> Uuid {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();

        let before = sessions.len();
        sessions.retain(|_, s| now.duration_since(s.last_used) < self.idle_timeout);
        if sessions.len() < before {
            debug!(evicted = before - sessions.len(), "evicted idle sessions");
        }

        let id = id.unwrap_or_else(Uuid::new_v4);
        let session = sessions.entry(id).or_insert_with(|| Session {
            tool,
            result: None,
            last_used: now,
        });

        if session.tool != tool {
            debug!(session = %id, from = session.tool.id(), to = tool.id(), "tool switched");
            session.tool = tool;
            session.result = None;
        }
        session.last_used = now;

        id
    }

    /// Store a successful result, unless the session moved on to another tool meanwhile
    pub async fn finish(&self, id: Uuid, tool: Tool, artifact: Arc<Artifact>) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(&id) {
            if session.tool == tool {
                session.result = Some(artifact);
                session.last_used = Instant::now();
            }
        }
    }

    /// The cached result, unless the session has been idle past the timeout
    pub async fn result(&self, id: Uuid) -> Option<Arc<Artifact>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .filter(|s| s.last_used.elapsed() < self.idle_timeout)
            .and_then(|s| s.result.clone())
    }

    /// Drop a session; returns false if it did not exist
    pub async fn discard(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
