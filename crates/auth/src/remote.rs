//! Credentials for outbound calls to other internal services.

use std::sync::Arc;

use crate::context::AuthenticationContext;
use crate::error::RemoteAuthError;
use crate::request::RequestContext;

pub const BEARER_TYPE: &str = "Bearer";

/// Supplies the `Authorization` header for a call this process makes.
pub trait RemoteAuthenticator: Send + Sync {
    /// Authorization scheme, e.g. `"Bearer"`.
    fn auth_type(&self) -> &'static str;

    fn has_credential(&self, request: &RequestContext) -> bool;

    /// The credential to send. Only valid when [`has_credential`] is true.
    ///
    /// [`has_credential`]: RemoteAuthenticator::has_credential
    fn credentials(&self, request: &RequestContext) -> Result<String, RemoteAuthError>;

    /// Full header value, resolving the caller once.
    fn authorization_header(&self, request: &RequestContext) -> Option<String> {
        self.credentials(request)
            .ok()
            .map(|credential| format!("{} {credential}", self.auth_type()))
    }
}

/// Forwards whatever credential the authentication context resolves for the
/// current call: the user's own bearer token, or a minted system token.
pub struct InternalRemoteAuthenticator {
    context: Arc<dyn AuthenticationContext>,
}

impl InternalRemoteAuthenticator {
    pub fn new(context: Arc<dyn AuthenticationContext>) -> Self {
        Self { context }
    }
}

impl RemoteAuthenticator for InternalRemoteAuthenticator {
    fn auth_type(&self) -> &'static str {
        BEARER_TYPE
    }

    fn has_credential(&self, request: &RequestContext) -> bool {
        self.context.get_principal(request).credential().is_some()
    }

    fn credentials(&self, request: &RequestContext) -> Result<String, RemoteAuthError> {
        let principal = self.context.get_principal(request);
        principal
            .credential()
            .map(str::to_string)
            .ok_or_else(|| RemoteAuthError::MissingCredential(principal.name().to_string()))
    }
}
