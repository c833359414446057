//! HTTP application wiring (Axum router + service wiring).
//!
//! - `routes.rs`: handlers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use keystone_auth::{
    AccessEnforcer, AuthenticationContext, ClaimsError, TokenManager, build_access_enforcer,
    build_authentication_context,
};
use keystone_core::SecurityConfig;

use crate::middleware;

pub mod errors;
pub mod routes;

/// Components the handlers need, chosen once for the deployment.
#[derive(Clone)]
pub struct AppServices {
    pub auth_context: Arc<dyn AuthenticationContext>,
    pub enforcer: Arc<dyn AccessEnforcer>,
    pub system_identity: String,
}

impl AppServices {
    pub fn from_config(config: &SecurityConfig, manager: Arc<TokenManager>) -> Result<Self, ClaimsError> {
        Ok(Self {
            auth_context: build_authentication_context(config, manager.clone())?,
            enforcer: build_access_enforcer(config, manager),
            system_identity: config.system_identity.clone(),
        })
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: AppServices) -> Router {
    let auth_state = middleware::AuthState {
        enforcer: services.enforcer.clone(),
        system_identity: services.system_identity.as_str().into(),
    };

    // Internal routes: require a valid system token.
    let internal = Router::new()
        .route("/internal/whoami", get(routes::whoami))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::internal_auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::health))
        .route("/v1/principal", get(routes::principal))
        .merge(internal)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::security_context_middleware))
                .layer(Extension(Arc::new(services))),
        )
}
