use crate::{
    AppState,
    api::handlers::current_session,
    auth::middleware::AuthUser,
    types::{AppError, ChatRequest, ChatResponse, HistoryResponse, Result},
};
use axum::{Json, extract::State, http::StatusCode};

/// Ask a question about the knowledge base
///
/// Pipeline failures are reported inside the response (`status = failed`),
/// so this endpoint only errors on a blank message or a closed session.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Answer with sources", body = ChatResponse),
        (status = 400, description = "Blank message"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "chat",
    security(("bearer" = []))
)]
pub async fn chat(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let question = payload.message.trim();
    if question.is_empty() {
        return Err(AppError::InvalidInput("Please enter a question.".to_string()));
    }

    current_session(&state, &claims.sub)?;

    let answer = state.pipeline.answer(question).await;

    let show_debug = state
        .sessions
        .update(&claims.sub, |session| {
            session.record_exchange(question, &answer);
            session.show_debug
        })
        .ok_or_else(|| AppError::Auth("Session has ended".to_string()))?;

    Ok(Json(ChatResponse::from_answer(&answer, show_debug)))
}

/// Chat history of the session
#[utoipa::path(
    get,
    path = "/api/chat/history",
    responses(
        (status = 200, description = "Messages and counters", body = HistoryResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "chat",
    security(("bearer" = []))
)]
pub async fn get_history(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<HistoryResponse>> {
    let session = current_session(&state, &claims.sub)?;
    let stats = session.stats();

    Ok(Json(HistoryResponse {
        messages: session.history,
        stats,
    }))
}

/// Clear the chat history of the session
#[utoipa::path(
    delete,
    path = "/api/chat/history",
    responses(
        (status = 204, description = "History cleared"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "chat",
    security(("bearer" = []))
)]
pub async fn clear_history(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<StatusCode> {
    state
        .sessions
        .clear_history(&claims.sub)
        .ok_or_else(|| AppError::Auth("Session has ended".to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}
