use async_trait::async_trait;
use thiserror::Error;

use super::types::{AuthRequest, Identity};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Token expired")]
    Expired,

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl AuthError {
    /// Short machine-readable code used on the wire and in metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::NotAuthenticated => "not_authenticated",
            AuthError::InvalidCredentials(_) => "auth_failed",
            AuthError::Expired => "token_expired",
            AuthError::ConfigurationError(_) => "auth_unavailable",
        }
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate a request and return the identity
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    /// Name of this authentication method
    fn method_name(&self) -> &'static str;
}
