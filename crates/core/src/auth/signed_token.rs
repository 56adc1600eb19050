//! Signed, expiring bearer tokens.
//!
//! Token layout: `<user_id>.<expires_at_unix>.<signature_hex>` where the
//! signature is SHA-256 over `secret:user_id.expires_at:secret`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Authenticator that validates self-contained signed tokens.
///
/// A valid, unexpired token yields its embedded user id.
pub struct SignedTokenAuthenticator {
    secret: String,
}

impl SignedTokenAuthenticator {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Mint a token for `user_id` valid until `expires_at`.
    pub fn issue(&self, user_id: &str, expires_at: DateTime<Utc>) -> String {
        let payload = format!("{}.{}", user_id, expires_at.timestamp());
        let signature = self.sign(&payload);
        format!("{}.{}", payload, signature)
    }

    /// Verify a token against `now`, returning the user id.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
        // user ids may contain dots; the last two segments are fixed
        let mut parts = token.rsplitn(3, '.');
        let (Some(signature), Some(expires), Some(user_id)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::InvalidCredentials(
                "Malformed token".to_string(),
            ));
        };

        if user_id.is_empty() {
            return Err(AuthError::InvalidCredentials(
                "Malformed token".to_string(),
            ));
        }

        let expected = self.sign(&format!("{}.{}", user_id, expires));
        if !constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
            return Err(AuthError::InvalidCredentials(
                "Invalid signature".to_string(),
            ));
        }

        let expires_at: i64 = expires
            .parse()
            .map_err(|_| AuthError::InvalidCredentials("Malformed expiry".to_string()))?;
        if now.timestamp() >= expires_at {
            return Err(AuthError::Expired);
        }

        Ok(user_id.to_string())
    }

    fn sign(&self, payload: &str) -> String {
        let digest = Sha256::digest(format!("{}:{}:{}", self.secret, payload, self.secret));
        format!("{:x}", digest)
    }
}

#[async_trait]
impl Authenticator for SignedTokenAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let token = request.bearer_token().ok_or(AuthError::NotAuthenticated)?;
        let user_id = self.verify(token, Utc::now())?;

        Ok(Identity {
            user_id,
            method: "signed_token".to_string(),
            claims: std::collections::HashMap::new(),
        })
    }

    fn method_name(&self) -> &'static str {
        "signed_token"
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
