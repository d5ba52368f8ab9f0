//! Per-login conversation state.
//!
//! A [`SessionState`] holds what one logged-in user sees: their email, the
//! chat history and the debug toggle. The HTTP server keeps one per session
//! in a [`SessionStore`]; the terminal chat owns a single `SessionState`
//! directly. Nothing here is persisted.
//!
//! Store sessions live as long as the token issued for them. Expired entries
//! are invisible to lookups and are dropped when a new session is opened and
//! by the periodic sweep started with [`SessionStore::spawn_sweeper`].

use crate::types::{AppError, ChatTurn, RagAnswer, Result, Role, SessionStats};
use crate::utils::toml_config::AuthConfig;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

const DEFAULT_SESSION_TTL_SECS: i64 = 86400;
const DEFAULT_MAX_SESSIONS: usize = 10_000;

#[derive(Debug, Clone)]
pub struct SessionState {
    pub email: String,
    pub history: Vec<ChatTurn>,
    pub show_debug: bool,
    pub created_at: DateTime<Utc>,
    /// `None` for sessions that never expire (the terminal chat)
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            history: Vec::new(),
            show_debug: false,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    /// A session that expires `ttl` after creation.
    pub fn with_ttl(email: impl Into<String>, ttl: Duration) -> Self {
        let mut session = Self::new(email);
        session.expires_at = Some(session.created_at + ttl);
        session
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Append the question and the displayed answer with its sources.
    pub fn record_exchange(&mut self, question: &str, answer: &RagAnswer) {
        self.history.push(ChatTurn::user(question));
        self.history
            .push(ChatTurn::assistant(answer.answer(), answer.sources().to_vec()));
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.show_debug = enabled;
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            messages: self.history.len(),
            queries: self
                .history
                .iter()
                .filter(|turn| turn.role == Role::User)
                .count(),
        }
    }

    /// Sources of the most recent assistant turn.
    pub fn last_sources(&self) -> &[String] {
        self.history
            .iter()
            .rev()
            .find(|turn| turn.role == Role::Assistant)
            .map(|turn| turn.sources.as_slice())
            .unwrap_or(&[])
    }
}

/// Open sessions keyed by session id.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionState>>,
    ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(
            Duration::seconds(DEFAULT_SESSION_TTL_SECS),
            DEFAULT_MAX_SESSIONS,
        )
    }
}

impl SessionStore {
    /// Sessions live for `ttl`; at most `max_sessions` unexpired ones at a time.
    pub fn new(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
            max_sessions,
        }
    }

    /// Session lifetime and capacity from the `[auth]` section.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            Duration::seconds(config.session_expiry),
            config.max_sessions,
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Open a session and return its id.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` when `max_sessions` unexpired sessions are open.
    pub fn open(&self, email: &str) -> Result<String> {
        let now = Utc::now();
        let mut sessions = self.sessions.write();

        sessions.retain(|_, session| !session.is_expired(now));
        if sessions.len() >= self.max_sessions {
            warn!(open = sessions.len(), "Session limit reached");
            return Err(AppError::RateLimited(
                "Too many open sessions, try again later".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        sessions.insert(id.clone(), SessionState::with_ttl(email, self.ttl));
        Ok(id)
    }

    /// Close a session. Returns whether it was open.
    pub fn close(&self, id: &str) -> bool {
        self.sessions.write().remove(id).is_some()
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        before - sessions.len()
    }

    /// Purge expired sessions every `period` until the task is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, period: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let removed = self.purge_expired();
                if removed > 0 {
                    debug!(removed, "Expired sessions purged");
                }
            }
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        let now = Utc::now();
        self.sessions
            .read()
            .get(id)
            .is_some_and(|session| !session.is_expired(now))
    }

    /// Stored sessions, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Snapshot of a live session.
    pub fn get(&self, id: &str) -> Option<SessionState> {
        let now = Utc::now();
        self.sessions
            .read()
            .get(id)
            .filter(|session| !session.is_expired(now))
            .cloned()
    }

    /// Run `f` on a live session under the write lock.
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        let now = Utc::now();
        self.sessions
            .write()
            .get_mut(id)
            .filter(|session| !session.is_expired(now))
            .map(f)
    }

    pub fn record_exchange(&self, id: &str, question: &str, answer: &RagAnswer) -> Option<()> {
        self.update(id, |session| session.record_exchange(question, answer))
    }

    pub fn clear_history(&self, id: &str) -> Option<()> {
        self.update(id, SessionState::clear_history)
    }

    pub fn set_debug(&self, id: &str, enabled: bool) -> Option<()> {
        self.update(id, |session| session.set_debug(enabled))
    }

    pub fn stats(&self, id: &str) -> Option<SessionStats> {
        self.get(id).map(|session| session.stats())
    }
}
