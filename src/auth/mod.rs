//! Session tokens and the demo login gate
//!
//! # Module Structure
//!
//! - [`auth::gate`](crate::auth::gate) - Form checks of the demo login and sign-up
//! - [`auth::jwt`](crate::auth::jwt) - HS256 session token encoding and decoding
//! - [`auth::middleware`](crate::auth::middleware) - Axum middleware and the `AuthUser` extractor
//!
//! # Flow
//!
//! 1. `POST /api/auth/login` passes the form through [`DemoLoginGate`]
//! 2. A session is opened in the [`SessionStore`](crate::session::SessionStore)
//! 3. [`AuthService`] signs a token whose `sub` is the session id
//! 4. Protected routes run [`auth_middleware`], which verifies the token and
//!    checks the session is still open
//!
//! ## Extracting Claims in Handlers
//!
//! ```ignore
//! async fn protected_handler(AuthUser(claims): AuthUser) -> impl IntoResponse {
//!     format!("Hello, {}!", claims.email)
//! }
//! ```

pub mod gate;
pub mod jwt;
pub mod middleware;

pub use gate::DemoLoginGate;
pub use jwt::AuthService;
pub use middleware::{AuthUser, auth_middleware};
