use crate::{
    AppState,
    api::handlers::current_session,
    auth::middleware::AuthUser,
    types::{AppError, DebugToggleRequest, Result, SessionResponse},
};
use axum::{Json, extract::State};

/// Current session: email, debug toggle and counters
#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Session details", body = SessionResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "session",
    security(("bearer" = []))
)]
pub async fn get_session(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<SessionResponse>> {
    let session = current_session(&state, &claims.sub)?;

    Ok(Json(SessionResponse {
        stats: session.stats(),
        email: session.email,
        show_debug: session.show_debug,
    }))
}

/// Turn the debug block of chat responses on or off
#[utoipa::path(
    put,
    path = "/api/session/debug",
    request_body = DebugToggleRequest,
    responses(
        (status = 200, description = "Updated session", body = SessionResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "session",
    security(("bearer" = []))
)]
pub async fn set_debug(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<DebugToggleRequest>,
) -> Result<Json<SessionResponse>> {
    let session = state
        .sessions
        .update(&claims.sub, |session| {
            session.set_debug(payload.enabled);
            session.clone()
        })
        .ok_or_else(|| AppError::Auth("Session has ended".to_string()))?;

    Ok(Json(SessionResponse {
        stats: session.stats(),
        email: session.email,
        show_debug: session.show_debug,
    }))
}
