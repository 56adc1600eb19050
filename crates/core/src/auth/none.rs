use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Authenticator that accepts all requests.
///
/// A bearer token, when present, is taken verbatim as the user id so that
/// multiple local clients stay distinguishable; otherwise the identity is
/// anonymous.
pub struct NoneAuthenticator;

impl NoneAuthenticator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoneAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for NoneAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        match request.bearer_token() {
            Some(token) => Ok(Identity {
                user_id: token.to_string(),
                ..Identity::anonymous()
            }),
            None => Ok(Identity::anonymous()),
        }
    }

    fn method_name(&self) -> &'static str {
        "none"
    }
}
