//! HTTP API Handlers and Routes
//!
//! This module provides the REST API of kbase, built on the Axum web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! ## Authentication (`/api/auth`)
//! - `POST /api/auth/login` - Log in through the demo gate and receive a session token
//! - `POST /api/auth/signup` - Sign up through the demo gate and receive a session token
//! - `POST /api/auth/logout` - Close the session
//!
//! ## Chat (`/api/chat`)
//! - `POST /api/chat` - Ask a question, receive the answer and its sources
//! - `GET /api/chat/history` - Messages of the session with counters
//! - `DELETE /api/chat/history` - Clear the chat
//! - `GET /api/examples` - Example questions (public)
//!
//! ## Session (`/api/session`)
//! - `GET /api/session` - Email, debug toggle and counters
//! - `PUT /api/session/debug` - Show or hide retrieval details in chat responses
//!
//! ## Health
//! - `GET /health` - Liveness check
//!
//! # Authentication
//!
//! Session endpoints require the token returned at login in the
//! `Authorization` header:
//! ```text
//! Authorization: Bearer <token>
//! ```
//!
//! # OpenAPI Documentation
//!
//! The OpenAPI document is served at `/api-docs/openapi.json`. When the
//! `swagger-ui` feature is enabled, interactive API documentation is
//! available at `/swagger-ui/`.

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

#[derive(OpenApi)]
#[openapi(
    info(title = "kbase", description = "Knowledge base chat API"),
    paths(
        handlers::health::health,
        handlers::auth::login,
        handlers::auth::signup,
        handlers::auth::logout,
        handlers::chat::chat,
        handlers::chat::get_history,
        handlers::chat::clear_history,
        handlers::examples::list_examples,
        handlers::session::get_session,
        handlers::session::set_debug,
    ),
    components(schemas(
        handlers::health::HealthResponse,
        crate::types::LoginRequest,
        crate::types::SignupRequest,
        crate::types::TokenResponse,
        crate::types::ChatRequest,
        crate::types::ChatResponse,
        crate::types::DebugInfo,
        crate::types::AnswerStatus,
        crate::types::FailureKind,
        crate::types::ChatTurn,
        crate::types::Role,
        crate::types::HistoryResponse,
        crate::types::SessionStats,
        crate::types::SessionResponse,
        crate::types::DebugToggleRequest,
        crate::types::ExamplesResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Demo login and session tokens"),
        (name = "chat", description = "Questions over the knowledge base"),
        (name = "session", description = "Per-login state"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
