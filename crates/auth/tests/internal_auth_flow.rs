//! Caller mints, the header travels, the receiver enforces.

use std::sync::Arc;

use keystone_auth::{
    AccessEnforcer, AccessError, DenialReason, EntityId, InternalAccessEnforcer,
    InternalRemoteAuthenticator, Permission, Principal, RemoteAuthenticator, RequestContext,
    TokenManager, build_authentication_context,
};
use keystone_core::{DeploymentMode, ManualClock, SecurityConfig};

struct Service {
    clock: Arc<ManualClock>,
    config: SecurityConfig,
    manager: Arc<TokenManager>,
}

impl Service {
    fn new(secret: &[u8], clock: Arc<ManualClock>) -> Self {
        let config = SecurityConfig {
            deployment_mode: DeploymentMode::Master,
            enforce_internal_auth: true,
            shared_secret: Some(secret.to_vec()),
            ..SecurityConfig::default()
        };
        let manager = Arc::new(TokenManager::from_config(&config, clock.clone()));
        Self {
            clock,
            config,
            manager,
        }
    }

    fn authenticator(&self) -> InternalRemoteAuthenticator {
        let context = build_authentication_context(&self.config, self.manager.clone()).unwrap();
        InternalRemoteAuthenticator::new(context)
    }

    fn enforcer(&self) -> InternalAccessEnforcer {
        InternalAccessEnforcer::new(self.manager.clone(), self.config.system_identity.clone())
    }
}

/// What the receiving boundary does with an inbound `Authorization` header.
fn inbound_principal(header: &str) -> Principal {
    let request = RequestContext::from_headers(None, None, Some(header));
    Principal::internal("system", request.credential().unwrap())
}

#[test]
fn background_call_between_services_is_admitted() {
    let clock = Arc::new(ManualClock::new(1_000_000));
    let caller = Service::new(b"k1", clock.clone());
    let receiver = Service::new(b"k1", clock);

    let header = caller
        .authenticator()
        .authorization_header(&RequestContext::background())
        .unwrap();
    assert!(header.starts_with("Bearer "));

    let principal = inbound_principal(&header);
    receiver
        .enforcer()
        .enforce(&EntityId::new("artifact:core-plugins"), &principal, &Permission::new("artifact.read"))
        .unwrap();
}

#[test]
fn minted_credential_expires_after_token_lifetime() {
    let clock = Arc::new(ManualClock::new(1_000_000));
    let caller = Service::new(b"k1", clock.clone());
    let receiver = Service::new(b"k1", clock.clone());

    let header = caller
        .authenticator()
        .authorization_header(&RequestContext::background())
        .unwrap();
    let principal = inbound_principal(&header);
    let entity = EntityId::new("namespace:default");
    let permission = Permission::new("namespace.get");

    receiver.clock.advance(caller.config.token_lifetime_ms);
    assert!(receiver.enforcer().enforce(&entity, &principal, &permission).is_ok());

    receiver.clock.advance(1);
    assert_eq!(
        receiver.enforcer().enforce(&entity, &principal, &permission),
        Err(AccessError::denied(DenialReason::Expired))
    );
}

#[test]
fn receiver_with_different_secret_rejects_caller() {
    let clock = Arc::new(ManualClock::new(0));
    let caller = Service::new(b"k1", clock.clone());
    let receiver = Service::new(b"k2", clock);

    let header = caller
        .authenticator()
        .authorization_header(&RequestContext::background())
        .unwrap();

    assert_eq!(
        receiver.enforcer().enforce(
            &EntityId::new("namespace:default"),
            &inbound_principal(&header),
            &Permission::new("namespace.get"),
        ),
        Err(AccessError::denied(DenialReason::Signature))
    );
}

#[test]
fn user_request_forwards_user_credential_not_system_token() {
    let clock = Arc::new(ManualClock::new(0));
    let caller = Service::new(b"k1", clock);
    let request = RequestContext::from_headers(Some("alice"), Some("10.0.0.7"), Some("Bearer alice-sso-token"));

    let header = caller.authenticator().authorization_header(&request).unwrap();
    assert_eq!(header, "Bearer alice-sso-token");
}
