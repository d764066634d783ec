//! Caller identity resolution.
//!
//! Every operation is scoped to an owner ID. The engine never trusts a
//! caller-supplied owner directly; a front end resolves credentials to an
//! owner through [`AuthProvider`] and passes the result down.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credentials")]
    Unauthenticated,
    #[error("invalid token")]
    InvalidToken,
}

/// Maps a bearer token to an owner ID.
pub trait AuthProvider: Send + Sync {
    fn resolve_user(&self, bearer: Option<&str>) -> Result<String, AuthError>;
}

/// Fixed token-to-user table, for tests and single-machine use.
#[derive(Debug, Default)]
pub struct StaticTokens {
    tokens: HashMap<String, String>,
}

impl StaticTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, user_id: &str) -> Self {
        self.tokens.insert(token.to_string(), user_id.to_string());
        self
    }
}

impl AuthProvider for StaticTokens {
    fn resolve_user(&self, bearer: Option<&str>) -> Result<String, AuthError> {
        let token = bearer.ok_or(AuthError::Unauthenticated)?;
        self.tokens
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

/// Everything resolves to one fixed user. Used by the local CLI where the
/// caller owns the database file.
#[derive(Debug, Clone)]
pub struct SingleUser {
    user_id: String,
}

impl SingleUser {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
        }
    }
}

impl AuthProvider for SingleUser {
    fn resolve_user(&self, _bearer: Option<&str>) -> Result<String, AuthError> {
        Ok(self.user_id.clone())
    }
}
