use crate::types::{AppError, Claims, Result, TokenResponse};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

/// Issues and verifies session tokens.
///
/// Tokens are HS256 JWTs whose subject is the session id; the session itself
/// lives in the [`SessionStore`](crate::session::SessionStore).
pub struct AuthService {
    jwt_secret: String,
    session_expiry: i64,
}

impl AuthService {
    /// Creates a new AuthService.
    ///
    /// # Arguments
    /// * `jwt_secret` - Secret key for signing JWTs (should be at least 32 chars)
    /// * `session_expiry` - Token validity in seconds
    pub fn new(jwt_secret: String, session_expiry: i64) -> Self {
        Self {
            jwt_secret,
            session_expiry,
        }
    }

    pub fn session_expiry(&self) -> i64 {
        self.session_expiry
    }

    /// Issues a token for a session.
    pub fn issue_token(&self, session_id: &str, email: &str) -> Result<TokenResponse> {
        let now = Utc::now();
        let claims = Claims {
            sub: session_id.to_string(),
            email: email.to_string(),
            exp: (now + Duration::seconds(self.session_expiry)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Auth(format!("Failed to generate token: {}", e)))?;

        Ok(TokenResponse {
            access_token,
            expires_in: self.session_expiry,
            email: email.to_string(),
        })
    }

    /// Verifies a JWT token and returns the claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))
    }
}
