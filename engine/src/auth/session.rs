//! In-process session store
//!
//! Maps opaque session tokens to user ids. Only the id is kept: the
//! principal (email, role, name) is re-read from the store on every request,
//! so a role change applies to open sessions immediately.
//!
//! Sessions do not survive a restart.

use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Length of generated session tokens
pub const TOKEN_LEN: usize = 32;

#[derive(Debug, Clone)]
struct SessionEntry {
    user_id: i64,
    created_at: u64,
}

/// Token → user id map with expiry
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, SessionEntry>>>,
    ttl: Duration,
}

impl SessionStore {
    /// Create an empty store whose sessions live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Session lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Open a session for a user and return its token
    pub fn open(&self, user_id: i64) -> String {
        let token = generate_token();
        let now = now_secs();
        let ttl = self.ttl.as_secs();

        let mut sessions = self.sessions.lock().unwrap_or_else(|p| p.into_inner());
        sessions.insert(
            token.clone(),
            SessionEntry {
                user_id,
                created_at: now,
            },
        );

        // Drop expired sessions while we hold the lock
        sessions.retain(|_, s| now.saturating_sub(s.created_at) < ttl);

        tracing::debug!("Opened session for user {}", user_id);
        token
    }

    /// Resolve a token to its user id, if the session is live
    pub fn resolve(&self, token: &str) -> Option<i64> {
        let sessions = self.sessions.lock().unwrap_or_else(|p| p.into_inner());
        sessions
            .get(token)
            .filter(|s| now_secs().saturating_sub(s.created_at) < self.ttl.as_secs())
            .map(|s| s.user_id)
    }

    /// Close a session; unknown tokens are ignored
    pub fn close(&self, token: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(session) = sessions.remove(token) {
            tracing::debug!("Closed session for user {}", session.user_id);
        }
    }

    #[cfg(test)]
    fn backdate(&self, token: &str, secs: u64) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(s) = sessions.get_mut(token) {
            s.created_at -= secs;
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Generate a random alphanumeric session token
fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}
