use std::sync::Arc;

use axum::{
    extract::State,
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use keystone_auth::{AccessEnforcer, EntityId, Permission, Principal, PrincipalType};

use crate::app::errors::{access_error_to_response, json_error};
use crate::context::CallContext;

#[derive(Clone)]
pub struct AuthState {
    pub enforcer: Arc<dyn AccessEnforcer>,
    pub system_identity: Arc<str>,
}

/// Seed the [`CallContext`] from request headers.
pub async fn security_context_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let call = CallContext::from_headers(req.headers());
    let span = tracing::info_span!(
        "request",
        request_id = %call.request_id(),
        method = %req.method(),
        path = req.uri().path(),
    );
    req.extensions_mut().insert(call);

    next.run(req).instrument(span).await
}

/// Admit only callers presenting a valid internal token.
///
/// The bearer credential is taken as an INTERNAL principal and checked by the
/// enforcer before the handler runs. The resolved [`Principal`] is handed to
/// the handler through the request extensions.
pub async fn internal_auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let call = match req.extensions().get::<CallContext>() {
        Some(call) => call.clone(),
        None => CallContext::from_headers(req.headers()),
    };

    let credential = call.request().credential().map(str::to_string);
    let principal = Principal::new(
        &*state.system_identity,
        PrincipalType::Internal,
        credential.clone(),
    );
    let entity = EntityId::new(req.uri().path());
    let permission = permission_for(req.method());

    match state.enforcer.enforce(&entity, &principal, &permission) {
        Ok(()) => {}
        Err(err) if credential.is_none() && err.denial_reason().is_some() => {
            return Err(json_error(
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "internal credential required",
            ));
        }
        Err(err) => return Err(access_error_to_response(err)),
    }

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

fn permission_for(method: &Method) -> Permission {
    if method == Method::GET || method == Method::HEAD {
        Permission::new("internal.read")
    } else {
        Permission::new("internal.write")
    }
}
