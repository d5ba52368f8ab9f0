use crate::{AppState, types::ExamplesResponse};
use axum::{Json, extract::State};

/// Quick questions shown next to the chat
///
/// Read through the config manager, so edits to `[ui]` apply without a restart.
#[utoipa::path(
    get,
    path = "/api/examples",
    responses(
        (status = 200, description = "Example questions", body = ExamplesResponse)
    ),
    tag = "chat"
)]
pub async fn list_examples(State(state): State<AppState>) -> Json<ExamplesResponse> {
    let config = state.config_manager.config();
    Json(ExamplesResponse {
        questions: config.ui.example_questions.clone(),
    })
}
