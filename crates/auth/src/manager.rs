//! Minting and validation of signed tokens.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use keystone_core::{Clock, RotationPolicy, SecretId, SecurityConfig};

use crate::codec::signing_payload;
use crate::error::InvalidToken;
use crate::identity::Identity;
use crate::secret::{SecretSet, SecretStore, SigningSecret};
use crate::token::AccessToken;

type HmacSha256 = Hmac<Sha256>;

/// Holds the signing secrets of this process and signs/validates tokens.
///
/// Signing and validation are synchronous and lock-free apart from cloning the
/// current secret snapshot; they are safe to call from any number of threads
/// while [`TokenManager::rotate`] runs.
#[derive(Debug)]
pub struct TokenManager {
    secrets: SecretStore,
    policy: RotationPolicy,
    clock: Arc<dyn Clock>,
}

impl TokenManager {
    pub fn new(initial: SigningSecret, policy: RotationPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            secrets: SecretStore::new(initial),
            policy,
            clock,
        }
    }

    /// Manager over key material shared with peer services. Never rotates on
    /// its own.
    pub fn with_shared_secret(key: impl Into<Vec<u8>>, clock: Arc<dyn Clock>) -> Self {
        let secret = SigningSecret::new(key, clock.now_millis());
        Self::new(secret, RotationPolicy::disabled(), clock)
    }

    /// Manager seeded with a freshly generated secret.
    pub fn generated(policy: RotationPolicy, clock: Arc<dyn Clock>) -> Self {
        let secret = SigningSecret::generate(clock.now_millis());
        Self::new(secret, policy, clock)
    }

    pub fn from_config(config: &SecurityConfig, clock: Arc<dyn Clock>) -> Self {
        match &config.shared_secret {
            Some(key) => Self::with_shared_secret(key.clone(), clock),
            None => Self::generated(config.rotation, clock),
        }
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Secrets currently accepted for validation.
    pub fn secrets(&self) -> Arc<SecretSet> {
        self.secrets.snapshot()
    }

    /// Sign `identity` with the current secret.
    pub fn sign_identifier(&self, identity: &Identity) -> AccessToken {
        let snapshot = self.secrets.snapshot();
        let signature = keyed_mac(snapshot.current().key(), &signing_payload(identity))
            .finalize()
            .into_bytes()
            .to_vec();
        AccessToken::from_parts(identity.clone(), signature)
    }

    /// Check that `token` is unexpired and was signed by a retained secret.
    ///
    /// Expiry is checked first and always; a correctly signed token past its
    /// window is [`TokenState::Expired`](crate::TokenState::Expired).
    pub fn validate_secret(&self, token: &AccessToken) -> Result<(), InvalidToken> {
        let now = self.clock.now_millis();
        let identity = token.identity();
        if !identity.is_valid_at(now) {
            tracing::debug!(
                username = identity.username(),
                expires_at_ms = identity.expires_at_ms(),
                now_ms = now,
                "token expired"
            );
            return Err(InvalidToken::expired());
        }

        let snapshot = self.secrets.snapshot();
        let payload = signing_payload(identity);
        let matched = snapshot
            .candidates()
            .find(|secret| keyed_mac(secret.key(), &payload).verify_slice(token.signature()).is_ok());

        match matched {
            Some(secret) => {
                tracing::trace!(secret_id = %secret.id(), "token signature verified");
                Ok(())
            }
            None => {
                tracing::debug!(
                    username = identity.username(),
                    candidates = snapshot.len(),
                    "token signature matches no retained secret"
                );
                Err(InvalidToken::signature_mismatch())
            }
        }
    }

    /// Replace the current secret with a generated one.
    pub fn rotate(&self) -> SecretId {
        self.rotate_to(SigningSecret::generate(self.clock.now_millis()))
    }

    /// Replace the current secret with `next`, demoting the old one.
    pub fn rotate_to(&self, next: SigningSecret) -> SecretId {
        let id = next.id();
        let set = self.secrets.rotate(next, self.clock.now_millis(), &self.policy);
        tracing::info!(secret_id = %id, retained_previous = set.len() - 1, "signing secret rotated");
        id
    }
}

fn keyed_mac(key: &[u8], payload: &[u8]) -> HmacSha256 {
    // HMAC takes keys of any length; the error case is for fixed-size MACs.
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(payload);
    mac
}
