use crate::{
    AppState,
    auth::middleware::AuthUser,
    types::{LoginRequest, Result, SignupRequest, TokenResponse},
};
use axum::{Json, extract::State, http::StatusCode};
use tracing::info;

/// Log in through the demo gate
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = TokenResponse),
        (status = 400, description = "Missing fields or password too short"),
        (status = 429, description = "Too many open sessions")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    let email = state.login_gate.login(&payload)?;
    open_session(&state, &email).map(Json)
}

/// Sign up through the demo gate
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Session opened", body = TokenResponse),
        (status = 400, description = "Missing fields, mismatched or short password"),
        (status = 429, description = "Too many open sessions")
    ),
    tag = "auth"
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<Json<TokenResponse>> {
    let email = state.login_gate.signup(&payload)?;
    open_session(&state, &email).map(Json)
}

/// End the session and discard its history
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 204, description = "Session closed"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth",
    security(("bearer" = []))
)]
pub async fn logout(State(state): State<AppState>, AuthUser(claims): AuthUser) -> StatusCode {
    state.sessions.close(&claims.sub);
    info!(email = %claims.email, "Session closed");
    StatusCode::NO_CONTENT
}

fn open_session(state: &AppState, email: &str) -> Result<TokenResponse> {
    let session_id = state.sessions.open(email)?;

    match state.auth_service.issue_token(&session_id, email) {
        Ok(token) => {
            info!(email, "Session opened");
            Ok(token)
        }
        Err(e) => {
            state.sessions.close(&session_id);
            Err(e)
        }
    }
}
