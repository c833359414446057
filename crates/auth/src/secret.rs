//! Signing secrets and the copy-on-write set that holds them.
//!
//! Readers take an `Arc<SecretSet>` snapshot and work on it without holding
//! any lock. Rotation builds a new set next to the old one and swaps the
//! pointer, so a validation that started before a rotation finishes against
//! the secrets it started with. Concurrent rotations take turns.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use rand::RngCore;
use rand::rngs::OsRng;

use keystone_core::{RotationPolicy, SecretId};

/// Length of generated key material (matches the SHA-256 block-size guidance).
pub const GENERATED_SECRET_LEN: usize = 32;

/// Symmetric key material used to sign and verify tokens.
#[derive(Clone)]
pub struct SigningSecret {
    id: SecretId,
    key: Arc<[u8]>,
    created_at_ms: i64,
}

impl SigningSecret {
    pub fn new(key: impl Into<Vec<u8>>, created_at_ms: i64) -> Self {
        let key: Vec<u8> = key.into();
        Self {
            id: SecretId::new(),
            key: Arc::from(key),
            created_at_ms,
        }
    }

    /// Fresh random key from the operating system's CSPRNG.
    pub fn generate(created_at_ms: i64) -> Self {
        let mut key = vec![0u8; GENERATED_SECRET_LEN];
        OsRng.fill_bytes(&mut key);
        Self::new(key, created_at_ms)
    }

    pub fn id(&self) -> SecretId {
        self.id
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }
}

impl core::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SigningSecret")
            .field("id", &self.id)
            .field("created_at_ms", &self.created_at_ms)
            .finish_non_exhaustive()
    }
}

/// A demoted secret and when it stopped signing.
#[derive(Debug, Clone)]
pub struct RetiredSecret {
    pub secret: SigningSecret,
    pub retired_at_ms: i64,
}

/// Immutable snapshot: the active secret plus recently demoted ones,
/// most recent first.
#[derive(Debug, Clone)]
pub struct SecretSet {
    current: SigningSecret,
    previous: VecDeque<RetiredSecret>,
}

impl SecretSet {
    pub fn new(current: SigningSecret) -> Self {
        Self {
            current,
            previous: VecDeque::new(),
        }
    }

    pub fn current(&self) -> &SigningSecret {
        &self.current
    }

    pub fn previous(&self) -> impl Iterator<Item = &RetiredSecret> {
        self.previous.iter()
    }

    /// Every secret a token may have been signed with, current first.
    pub fn candidates(&self) -> impl Iterator<Item = &SigningSecret> {
        core::iter::once(&self.current).chain(self.previous.iter().map(|r| &r.secret))
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        1 + self.previous.len()
    }

    /// New set with `next` active and the current secret demoted.
    ///
    /// Demoted secrets beyond `policy.retained_previous`, or retired for
    /// longer than the grace window, are dropped.
    pub fn rotated(&self, next: SigningSecret, now_ms: i64, policy: &RotationPolicy) -> Self {
        let mut previous = VecDeque::with_capacity(policy.retained_previous);
        previous.push_back(RetiredSecret {
            secret: self.current.clone(),
            retired_at_ms: now_ms,
        });
        previous.extend(self.previous.iter().cloned());

        previous.truncate(policy.retained_previous);
        if let Some(grace) = policy.grace_window_ms() {
            previous.retain(|r| now_ms.saturating_sub(r.retired_at_ms) < grace);
        }

        Self {
            current: next,
            previous,
        }
    }
}

/// Process-wide holder of the current [`SecretSet`].
#[derive(Debug)]
pub struct SecretStore {
    inner: RwLock<Arc<SecretSet>>,
}

impl SecretStore {
    pub fn new(initial: SigningSecret) -> Self {
        Self {
            inner: RwLock::new(Arc::new(SecretSet::new(initial))),
        }
    }

    /// The set in effect right now. Later rotations do not affect it.
    pub fn snapshot(&self) -> Arc<SecretSet> {
        Arc::clone(&self.inner.read())
    }

    /// Publish a rotated set and return it.
    ///
    /// Rotations are serialized: each one builds on the set published by the
    /// previous one. Readers keep taking snapshots until the final swap.
    pub fn rotate(&self, next: SigningSecret, now_ms: i64, policy: &RotationPolicy) -> Arc<SecretSet> {
        let base = self.inner.upgradable_read();
        let rotated = Arc::new(base.rotated(next, now_ms, policy));
        let mut current = RwLockUpgradableReadGuard::upgrade(base);
        *current = Arc::clone(&rotated);
        rotated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(interval_ms: i64, retained_previous: usize) -> RotationPolicy {
        RotationPolicy {
            interval_ms: Some(interval_ms),
            retained_previous,
        }
    }

    #[test]
    fn generated_secrets_differ() {
        let a = SigningSecret::generate(0);
        let b = SigningSecret::generate(0);
        assert_eq!(a.key().len(), GENERATED_SECRET_LEN);
        assert_ne!(a.key(), b.key());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn debug_never_prints_key_material() {
        let secret = SigningSecret::new(b"k1-super-secret".to_vec(), 0);
        assert!(!format!("{secret:?}").contains("super-secret"));
    }

    #[test]
    fn rotation_demotes_current_most_recent_first() {
        let policy = policy(1_000, 3);
        let s1 = SigningSecret::new(b"s1".to_vec(), 0);
        let s2 = SigningSecret::new(b"s2".to_vec(), 1_000);
        let s3 = SigningSecret::new(b"s3".to_vec(), 2_000);

        let set = SecretSet::new(s1.clone())
            .rotated(s2.clone(), 1_000, &policy)
            .rotated(s3.clone(), 2_000, &policy);

        let order: Vec<SecretId> = set.candidates().map(SigningSecret::id).collect();
        assert_eq!(order, vec![s3.id(), s2.id(), s1.id()]);
    }

    #[test]
    fn rotation_evicts_beyond_retained_count() {
        let policy = policy(1_000, 1);
        let s1 = SigningSecret::new(b"s1".to_vec(), 0);
        let set = SecretSet::new(s1.clone())
            .rotated(SigningSecret::new(b"s2".to_vec(), 1_000), 1_000, &policy)
            .rotated(SigningSecret::new(b"s3".to_vec(), 2_000), 2_000, &policy);

        assert_eq!(set.len(), 2);
        assert!(set.candidates().all(|s| s.id() != s1.id()));
    }

    #[test]
    fn rotation_evicts_secrets_retired_past_grace() {
        // Grace = 2 * 1_000ms; a late rotation drops a secret retired 2_500ms ago.
        let policy = policy(1_000, 2);
        let s1 = SigningSecret::new(b"s1".to_vec(), 0);
        let set = SecretSet::new(s1.clone())
            .rotated(SigningSecret::new(b"s2".to_vec(), 1_000), 1_000, &policy)
            .rotated(SigningSecret::new(b"s3".to_vec(), 3_500), 3_500, &policy);

        let retired: Vec<i64> = set.previous().map(|r| r.retired_at_ms).collect();
        assert_eq!(retired, vec![3_500]);
    }

    #[test]
    fn snapshots_survive_rotation() {
        let policy = policy(1_000, 1);
        let store = SecretStore::new(SigningSecret::new(b"s1".to_vec(), 0));
        let before = store.snapshot();

        store.rotate(SigningSecret::new(b"s2".to_vec(), 1_000), 1_000, &policy);

        assert_eq!(before.len(), 1);
        assert_eq!(before.current().key(), b"s1");
        assert_eq!(store.snapshot().current().key(), b"s2");
    }

    #[test]
    fn concurrent_rotations_keep_every_published_secret() {
        const THREADS: usize = 8;
        const ROTATIONS: usize = 200;
        let policy = policy(1_000, THREADS * ROTATIONS);
        let store = SecretStore::new(SigningSecret::new(b"s0".to_vec(), 0));
        let (store, policy) = (&store, &policy);

        let published: Vec<SecretId> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(move || {
                        (0..ROTATIONS)
                            .map(|_| {
                                let next = SigningSecret::generate(0);
                                let id = next.id();
                                store.rotate(next, 0, policy);
                                id
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers.into_iter().flat_map(|w| w.join().unwrap()).collect()
        });

        let set = store.snapshot();
        assert_eq!(set.len(), THREADS * ROTATIONS + 1);
        for id in published {
            assert!(set.candidates().any(|s| s.id() == id), "lost secret {id}");
        }
    }
}
