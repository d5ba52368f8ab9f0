//! Demo login gate.
//!
//! **Not a security boundary.** The gate checks the shape of the submitted
//! form and nothing else: there is no user store and no password
//! verification. Any non-empty email with a long enough password gets a
//! session. Replace it with a real identity provider before exposing the
//! service beyond a demo.

use crate::types::{AppError, LoginRequest, Result, SignupRequest};

#[derive(Debug, Clone)]
pub struct DemoLoginGate {
    min_password_len: usize,
}

impl DemoLoginGate {
    pub fn new(min_password_len: usize) -> Self {
        Self { min_password_len }
    }

    pub fn min_password_len(&self) -> usize {
        self.min_password_len
    }

    /// Accept a login form. Returns the normalized email.
    pub fn login(&self, request: &LoginRequest) -> Result<String> {
        let email = request.email.trim();
        if email.is_empty() || request.password.is_empty() {
            return Err(AppError::InvalidInput("Please fill all fields".to_string()));
        }
        self.check_length(&request.password)?;
        Ok(email.to_string())
    }

    /// Accept a sign-up form. Returns the normalized email.
    pub fn signup(&self, request: &SignupRequest) -> Result<String> {
        let email = request.email.trim();
        if email.is_empty() || request.password.is_empty() || request.confirm_password.is_empty()
        {
            return Err(AppError::InvalidInput("Please fill all fields".to_string()));
        }
        if request.password != request.confirm_password {
            return Err(AppError::InvalidInput("Passwords don't match".to_string()));
        }
        self.check_length(&request.password)?;
        Ok(email.to_string())
    }

    fn check_length(&self, password: &str) -> Result<()> {
        if password.chars().count() < self.min_password_len {
            return Err(AppError::InvalidInput(format!(
                "Password must be {}+ characters",
                self.min_password_len
            )));
        }
        Ok(())
    }
}

impl Default for DemoLoginGate {
    fn default() -> Self {
        Self::new(6)
    }
}
