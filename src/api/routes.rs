use crate::AppState;
use crate::api::handlers::{auth, chat, examples, health, session};
use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Routes mounted under `/api`.
pub fn create_router(state: AppState) -> Router<AppState> {
    let public_routes = Router::new()
        // Public routes (no auth required)
        .route("/auth/login", post(auth::login))
        .route("/auth/signup", post(auth::signup))
        .route("/examples", get(examples::list_examples));

    let protected_routes = Router::new()
        // Protected routes (auth required)
        .route("/auth/logout", post(auth::logout))
        .route("/chat", post(chat::chat))
        .route(
            "/chat/history",
            get(chat::get_history).delete(chat::clear_history),
        )
        .route("/session", get(session::get_session))
        .route("/session/debug", put(session::set_debug))
        .layer(middleware::from_fn_with_state(
            state,
            crate::auth::middleware::auth_middleware,
        ));

    public_routes.merge(protected_routes)
}

/// The complete application: `/health`, `/api`, the OpenAPI document and the
/// request tracing and CORS layers.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/health", get(health::health))
        .nest("/api", create_router(state.clone()));

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", crate::api::ApiDoc::openapi()),
        )
    };

    #[cfg(not(feature = "swagger-ui"))]
    let router = router.route("/api-docs/openapi.json", get(openapi_json));

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(not(feature = "swagger-ui"))]
async fn openapi_json() -> axum::Json<utoipa::openapi::OpenApi> {
    use utoipa::OpenApi;
    axum::Json(crate::api::ApiDoc::openapi())
}
