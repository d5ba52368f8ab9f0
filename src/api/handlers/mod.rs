//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Login, sign-up and logout.
pub mod auth;
/// Questions and chat history.
pub mod chat;
/// Example questions.
pub mod examples;
/// Liveness check.
pub mod health;
/// Session details and the debug toggle.
pub mod session;

use crate::{AppState, session::SessionState, types::{AppError, Result}};

/// Snapshot of the caller's session, or 401 if it was closed in the meantime.
pub(crate) fn current_session(state: &AppState, session_id: &str) -> Result<SessionState> {
    state
        .sessions
        .get(session_id)
        .ok_or_else(|| AppError::Auth("Session has ended".to_string()))
}
