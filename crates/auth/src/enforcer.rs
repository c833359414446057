//! Access enforcement for internal-only operations.

use std::collections::BTreeSet;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};

use keystone_core::{DeploymentMode, SecurityConfig};

use crate::codec::{AccessTokenCodec, Codec};
use crate::error::{AccessError, DenialReason};
use crate::manager::TokenManager;
use crate::permissions::{EntityId, EntityType, Permission};
use crate::principal::Principal;

/// Decides whether a principal may perform an operation.
///
/// Called by handlers before the protected operation runs; an `Err` means the
/// operation must not execute at all.
pub trait AccessEnforcer: Send + Sync {
    fn enforce_all(
        &self,
        entity: &EntityId,
        principal: &Principal,
        permissions: &[Permission],
    ) -> Result<(), AccessError>;

    fn enforce(
        &self,
        entity: &EntityId,
        principal: &Principal,
        permission: &Permission,
    ) -> Result<(), AccessError> {
        self.enforce_all(entity, principal, core::slice::from_ref(permission))
    }

    /// Check access for creating an entity of `entity_type` under `parent`.
    fn enforce_on_parent(
        &self,
        entity_type: &EntityType,
        parent: &EntityId,
        principal: &Principal,
        permission: &Permission,
    ) -> Result<(), AccessError>;

    /// Subset of `entities` the principal may see.
    fn is_visible(
        &self,
        entities: BTreeSet<EntityId>,
        principal: &Principal,
    ) -> Result<BTreeSet<EntityId>, AccessError>;
}

/// Accepts only INTERNAL principals carrying a valid system token, and then
/// authorizes everything.
#[derive(Debug)]
pub struct InternalAccessEnforcer {
    manager: Arc<TokenManager>,
    codec: AccessTokenCodec,
    system_identity: String,
}

impl InternalAccessEnforcer {
    pub fn new(manager: Arc<TokenManager>, system_identity: impl Into<String>) -> Self {
        Self {
            manager,
            codec: AccessTokenCodec,
            system_identity: system_identity.into(),
        }
    }

    fn validate_internal(&self, principal: &Principal) -> Result<(), AccessError> {
        if !principal.is_internal() {
            tracing::error!(
                principal = %principal,
                "internal access enforcement invoked for non-internal principal"
            );
            return Err(AccessError::IllegalCallerType {
                name: principal.name().to_string(),
                principal_type: principal.principal_type(),
            });
        }

        let Some(credential) = principal.credential() else {
            tracing::debug!(principal = %principal, "internal principal has no credential");
            return Err(AccessError::denied(DenialReason::MalformedCredential));
        };

        let bytes = STANDARD.decode(credential.as_bytes()).map_err(|e| {
            tracing::debug!(error = %e, "access token is not valid base64");
            AccessError::denied(DenialReason::MalformedCredential)
        })?;
        let token = self.codec.decode(&bytes).map_err(|e| {
            tracing::debug!(error = %e, "access token deserialization failure");
            AccessError::denied(DenialReason::MalformedCredential)
        })?;

        self.manager.validate_secret(&token).map_err(|e| {
            tracing::debug!(error = %e, "access token secret validation failure");
            AccessError::from(e)
        })?;

        let username = token.identity().username();
        if username != self.system_identity {
            tracing::debug!(username, "unexpected internal access token username");
            return Err(AccessError::denied(DenialReason::WrongIdentity));
        }
        Ok(())
    }
}

impl AccessEnforcer for InternalAccessEnforcer {
    fn enforce_all(
        &self,
        entity: &EntityId,
        principal: &Principal,
        permissions: &[Permission],
    ) -> Result<(), AccessError> {
        tracing::debug!(%entity, %principal, ?permissions, "internal enforce check");
        self.validate_internal(principal)
    }

    fn enforce_on_parent(
        &self,
        entity_type: &EntityType,
        parent: &EntityId,
        principal: &Principal,
        permission: &Permission,
    ) -> Result<(), AccessError> {
        tracing::debug!(%entity_type, %parent, %principal, %permission, "internal parent enforce check");
        self.validate_internal(principal)
    }

    fn is_visible(
        &self,
        entities: BTreeSet<EntityId>,
        principal: &Principal,
    ) -> Result<BTreeSet<EntityId>, AccessError> {
        tracing::debug!(count = entities.len(), %principal, "internal visibility check");
        self.validate_internal(principal)?;
        Ok(entities)
    }
}

/// Allows everything. For deployments running without authentication.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpAccessEnforcer;

impl AccessEnforcer for NoOpAccessEnforcer {
    fn enforce_all(&self, _: &EntityId, _: &Principal, _: &[Permission]) -> Result<(), AccessError> {
        Ok(())
    }

    fn enforce_on_parent(
        &self,
        _: &EntityType,
        _: &EntityId,
        _: &Principal,
        _: &Permission,
    ) -> Result<(), AccessError> {
        Ok(())
    }

    fn is_visible(
        &self,
        entities: BTreeSet<EntityId>,
        _: &Principal,
    ) -> Result<BTreeSet<EntityId>, AccessError> {
        Ok(entities)
    }
}

/// Enforcer for internal-only operations in this deployment.
///
/// Internal tokens are checked only when enforcement is switched on. With it
/// off, a Master process mints no tokens for background calls.
pub fn build_access_enforcer(
    config: &SecurityConfig,
    manager: Arc<TokenManager>,
) -> Arc<dyn AccessEnforcer> {
    match config.deployment_mode {
        DeploymentMode::Master | DeploymentMode::ProgramContainer if config.enforce_internal_auth => {
            Arc::new(InternalAccessEnforcer::new(manager, config.system_identity.clone()))
        }
        DeploymentMode::Master | DeploymentMode::ProgramContainer | DeploymentMode::NoOp => {
            tracing::debug!(mode = %config.deployment_mode, "internal access enforcement disabled");
            Arc::new(NoOpAccessEnforcer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AuthenticationContext, SystemAuthenticationContext};
    use crate::identity::{Identity, SystemIdentity};
    use crate::principal::PrincipalType;
    use crate::request::RequestContext;
    use keystone_core::ManualClock;

    struct Fixture {
        clock: Arc<ManualClock>,
        manager: Arc<TokenManager>,
        enforcer: InternalAccessEnforcer,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(1_000));
        let manager = Arc::new(TokenManager::with_shared_secret(b"k1".to_vec(), clock.clone()));
        let enforcer = InternalAccessEnforcer::new(manager.clone(), "system");
        Fixture {
            clock,
            manager,
            enforcer,
        }
    }

    fn credential_for(manager: &TokenManager, username: &str, expires: i64) -> String {
        let identity = Identity::new(username, Vec::<String>::new(), 0, expires).unwrap();
        let token = manager.sign_identifier(&identity);
        STANDARD.encode(AccessTokenCodec.encode(&token))
    }

    fn entity() -> EntityId {
        EntityId::new("namespace:default")
    }

    fn read() -> Permission {
        Permission::new("artifact.read")
    }

    fn denial(result: Result<(), AccessError>) -> Option<DenialReason> {
        result.unwrap_err().denial_reason()
    }

    #[test]
    fn minted_system_principal_is_authorized() {
        let f = fixture();
        let context = SystemAuthenticationContext::new(
            f.manager.clone(),
            SystemIdentity::new("system", 300_000).unwrap(),
        );
        let principal = context.get_principal(&RequestContext::background());

        assert!(f.enforcer.enforce(&entity(), &principal, &read()).is_ok());
        assert!(f
            .enforcer
            .enforce_all(&entity(), &principal, &[read(), Permission::new("artifact.write")])
            .is_ok());
        assert!(f
            .enforcer
            .enforce_on_parent(&EntityType::new("application"), &entity(), &principal, &read())
            .is_ok());
    }

    #[test]
    fn non_internal_principal_is_a_caller_bug() {
        let f = fixture();
        // Garbage credential: would be MalformedCredential if it were decoded.
        let principal = Principal::user("alice", Some("%%%not-base64%%%".to_string()));

        let err = f.enforcer.enforce(&entity(), &principal, &read()).unwrap_err();
        assert_eq!(
            err,
            AccessError::IllegalCallerType {
                name: "alice".to_string(),
                principal_type: PrincipalType::User,
            }
        );
        assert!(matches!(
            f.enforcer.is_visible(BTreeSet::new(), &principal),
            Err(AccessError::IllegalCallerType { .. })
        ));
    }

    #[test]
    fn undecodable_credentials_are_malformed() {
        let f = fixture();
        let missing = Principal::new("system", PrincipalType::Internal, None);
        let not_base64 = Principal::internal("system", "@@@");
        let not_a_token = Principal::internal("system", STANDARD.encode(b"\x07garbage"));

        for principal in [missing, not_base64, not_a_token] {
            assert_eq!(
                denial(f.enforcer.enforce(&entity(), &principal, &read())),
                Some(DenialReason::MalformedCredential)
            );
        }
    }

    #[test]
    fn valid_token_for_other_user_is_wrong_identity() {
        let f = fixture();
        let principal = Principal::internal("system", credential_for(&f.manager, "alice", 10_000));
        assert_eq!(
            denial(f.enforcer.enforce(&entity(), &principal, &read())),
            Some(DenialReason::WrongIdentity)
        );
    }

    #[test]
    fn expired_token_is_denied() {
        let f = fixture();
        let principal = Principal::internal("system", credential_for(&f.manager, "system", 5_000));
        f.clock.set(5_001);
        assert_eq!(
            denial(f.enforcer.enforce(&entity(), &principal, &read())),
            Some(DenialReason::Expired)
        );
    }

    #[test]
    fn token_from_other_secret_is_denied() {
        let f = fixture();
        let stranger = TokenManager::with_shared_secret(b"not-k1".to_vec(), f.clock.clone());
        let principal = Principal::internal("system", credential_for(&stranger, "system", 10_000));
        assert_eq!(
            denial(f.enforcer.enforce(&entity(), &principal, &read())),
            Some(DenialReason::Signature)
        );
    }

    #[test]
    fn visibility_passes_entities_through() {
        let f = fixture();
        let principal = Principal::internal("system", credential_for(&f.manager, "system", 10_000));
        let entities: BTreeSet<EntityId> = ["namespace:a", "namespace:b"]
            .into_iter()
            .map(EntityId::new)
            .collect();

        let visible = f.enforcer.is_visible(entities.clone(), &principal).unwrap();
        assert_eq!(visible, entities);
    }

    #[test]
    fn visibility_is_denied_for_invalid_tokens() {
        let f = fixture();
        let principal = Principal::internal("system", credential_for(&f.manager, "alice", 10_000));
        let err = f
            .enforcer
            .is_visible(BTreeSet::from([entity()]), &principal)
            .unwrap_err();
        assert_eq!(err.denial_reason(), Some(DenialReason::WrongIdentity));
    }

    #[test]
    fn noop_mode_allows_anyone() {
        let clock = Arc::new(ManualClock::new(0));
        let manager = Arc::new(TokenManager::with_shared_secret(b"k1".to_vec(), clock));
        let config = SecurityConfig {
            deployment_mode: DeploymentMode::NoOp,
            ..SecurityConfig::default()
        };
        let enforcer = build_access_enforcer(&config, manager);
        let principal = Principal::user("anyone", None);
        assert!(enforcer.enforce(&entity(), &principal, &read()).is_ok());
    }

    #[test]
    fn enforcement_follows_the_enforce_flag() {
        let clock = Arc::new(ManualClock::new(0));
        let manager = Arc::new(TokenManager::with_shared_secret(b"k1".to_vec(), clock));
        let no_credential = Principal::new("system", PrincipalType::Internal, None);

        for mode in [DeploymentMode::Master, DeploymentMode::ProgramContainer] {
            let open = SecurityConfig {
                deployment_mode: mode,
                enforce_internal_auth: false,
                ..SecurityConfig::default()
            };
            let enforcer = build_access_enforcer(&open, manager.clone());
            assert!(enforcer.enforce(&entity(), &no_credential, &read()).is_ok(), "{mode}");

            let enforced = SecurityConfig {
                enforce_internal_auth: true,
                ..open
            };
            let enforcer = build_access_enforcer(&enforced, manager.clone());
            let err = enforcer.enforce(&entity(), &no_credential, &read()).unwrap_err();
            assert_eq!(err.denial_reason(), Some(DenialReason::MalformedCredential), "{mode}");
        }
    }
}
