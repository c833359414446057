//! `keystone-auth` — internal service authentication.
//!
//! Mints short-lived signed tokens for the system identity, carries them as
//! bearer credentials, resolves the caller of each operation and gates
//! internal-only operations on a valid system token.
//!
//! This crate is intentionally decoupled from HTTP and storage; the only
//! inputs are explicit values (request context, clock, key material).

pub mod codec;
pub mod context;
pub mod enforcer;
pub mod error;
pub mod identity;
pub mod manager;
pub mod permissions;
pub mod principal;
pub mod remote;
pub mod request;
pub mod secret;
pub mod token;

pub use codec::{AccessTokenCodec, Codec, TOKEN_VERSION};
pub use context::{
    AuthenticationContext, MasterAuthenticationContext, ProcessAuthenticationContext,
    SystemAuthenticationContext, build_authentication_context,
};
pub use enforcer::{AccessEnforcer, InternalAccessEnforcer, NoOpAccessEnforcer, build_access_enforcer};
pub use error::{
    AccessError, ClaimsError, DenialReason, InvalidToken, MalformedToken, RemoteAuthError, TokenState,
};
pub use identity::{Identity, SystemIdentity};
pub use manager::TokenManager;
pub use permissions::{EntityId, EntityType, Permission};
pub use principal::{Principal, PrincipalType};
pub use remote::{BEARER_TYPE, InternalRemoteAuthenticator, RemoteAuthenticator};
pub use request::{RequestContext, USER_ID_HEADER, USER_IP_HEADER};
pub use secret::{SecretSet, SecretStore, SigningSecret};
pub use token::AccessToken;
