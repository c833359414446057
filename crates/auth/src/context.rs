//! Resolution of "who is making this call".
//!
//! Each variant implements [`AuthenticationContext`]; which one a process
//! uses is decided once at startup by [`build_authentication_context`] from
//! the configured [`DeploymentMode`].

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};

use keystone_core::{DeploymentMode, SecurityConfig};

use crate::codec::{AccessTokenCodec, Codec};
use crate::error::ClaimsError;
use crate::identity::SystemIdentity;
use crate::manager::TokenManager;
use crate::principal::Principal;
use crate::request::RequestContext;

/// Produces the [`Principal`] for the current call.
///
/// Evaluated fresh on every call; implementations hold no per-call state.
pub trait AuthenticationContext: Send + Sync {
    fn get_principal(&self, request: &RequestContext) -> Principal;
}

/// Always answers with a freshly minted system token.
#[derive(Debug)]
pub struct SystemAuthenticationContext {
    manager: Arc<TokenManager>,
    codec: AccessTokenCodec,
    system: SystemIdentity,
}

impl SystemAuthenticationContext {
    pub fn new(manager: Arc<TokenManager>, system: SystemIdentity) -> Self {
        Self {
            manager,
            codec: AccessTokenCodec,
            system,
        }
    }

    /// Base64 of a newly signed system token.
    pub fn mint_credential(&self) -> String {
        let identity = self.system.identity_at(self.manager.now_millis());
        let token = self.manager.sign_identifier(&identity);
        STANDARD.encode(self.codec.encode(&token))
    }
}

impl AuthenticationContext for SystemAuthenticationContext {
    fn get_principal(&self, _request: &RequestContext) -> Principal {
        Principal::internal(self.system.username(), self.mint_credential())
    }
}

/// The OS account this process runs as, with no credential.
#[derive(Debug, Clone)]
pub struct ProcessAuthenticationContext {
    username: String,
}

impl ProcessAuthenticationContext {
    /// Capture the current OS user.
    pub fn current() -> Self {
        Self::new(whoami::username())
    }

    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl AuthenticationContext for ProcessAuthenticationContext {
    fn get_principal(&self, _request: &RequestContext) -> Principal {
        Principal::user(self.username.clone(), None)
    }
}

/// Full resolution chain for control-plane services.
///
/// Precedence:
/// 1. a user id from the request wins, with the request's credential;
/// 2. otherwise, with internal auth enforced, the system identity;
/// 3. otherwise the process account.
///
/// Background work (no request user) lands in 2 or 3. With enforcement on, a
/// request therefore cannot fall through to the process account.
pub struct MasterAuthenticationContext {
    internal: Arc<dyn AuthenticationContext>,
    process: ProcessAuthenticationContext,
    enforce_internal_auth: bool,
}

impl MasterAuthenticationContext {
    pub fn new(
        internal: Arc<dyn AuthenticationContext>,
        process: ProcessAuthenticationContext,
        enforce_internal_auth: bool,
    ) -> Self {
        Self {
            internal,
            process,
            enforce_internal_auth,
        }
    }
}

impl AuthenticationContext for MasterAuthenticationContext {
    fn get_principal(&self, request: &RequestContext) -> Principal {
        if let Some(user_id) = request.user_id() {
            return Principal::user(user_id, request.credential().map(str::to_string));
        }
        if self.enforce_internal_auth {
            return self.internal.get_principal(request);
        }
        self.process.get_principal(request)
    }
}

/// Select the authentication context for this deployment.
///
/// Fails only if the configured system identity cannot be minted.
pub fn build_authentication_context(
    config: &SecurityConfig,
    manager: Arc<TokenManager>,
) -> Result<Arc<dyn AuthenticationContext>, ClaimsError> {
    let system = SystemIdentity::new(config.system_identity.clone(), config.token_lifetime_ms)?;
    let process = ProcessAuthenticationContext::current();

    let context: Arc<dyn AuthenticationContext> = match config.deployment_mode {
        DeploymentMode::Master => Arc::new(MasterAuthenticationContext::new(
            Arc::new(SystemAuthenticationContext::new(manager, system)),
            process,
            config.enforce_internal_auth,
        )),
        // Containers run no user code that could supply a request identity;
        // calls they make are always system calls.
        DeploymentMode::ProgramContainer => {
            Arc::new(SystemAuthenticationContext::new(manager, system))
        }
        DeploymentMode::NoOp => Arc::new(process),
    };

    tracing::info!(
        mode = %config.deployment_mode,
        enforce_internal_auth = config.enforce_internal_auth,
        "authentication context selected"
    );
    Ok(context)
}
