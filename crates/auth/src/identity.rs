use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::ClaimsError;

/// Longest username or group name a token can carry, in bytes.
pub const MAX_FIELD_LEN: usize = u16::MAX as usize;

/// Most groups a token can carry.
pub const MAX_GROUPS: usize = u16::MAX as usize;

/// Claims carried by an access token.
///
/// Immutable once built; the constructor is the only place the invariants are
/// checked, so every `Identity` in the process satisfies them:
/// - `expires_at_ms > issued_at_ms`
/// - username and groups fit the wire format limits
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Identity {
    username: String,
    groups: BTreeSet<String>,
    issued_at_ms: i64,
    expires_at_ms: i64,
}

impl Identity {
    pub fn new(
        username: impl Into<String>,
        groups: impl IntoIterator<Item = String>,
        issued_at_ms: i64,
        expires_at_ms: i64,
    ) -> Result<Self, ClaimsError> {
        let username = username.into();
        let groups: BTreeSet<String> = groups.into_iter().collect();

        if expires_at_ms <= issued_at_ms {
            return Err(ClaimsError::InvalidWindow {
                issued_at_ms,
                expires_at_ms,
            });
        }
        check_len("username", &username)?;
        if groups.len() > MAX_GROUPS {
            return Err(ClaimsError::TooManyGroups {
                count: groups.len(),
                max: MAX_GROUPS,
            });
        }
        for group in &groups {
            check_len("group", group)?;
        }

        Ok(Self {
            username,
            groups,
            issued_at_ms,
            expires_at_ms,
        })
    }

    /// Identity valid for `lifetime_ms` starting at `now_ms`, with no groups.
    pub fn starting_at(
        username: impl Into<String>,
        now_ms: i64,
        lifetime_ms: i64,
    ) -> Result<Self, ClaimsError> {
        Self::new(username, BTreeSet::<String>::new(), now_ms, now_ms.saturating_add(lifetime_ms))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    pub fn issued_at_ms(&self) -> i64 {
        self.issued_at_ms
    }

    pub fn expires_at_ms(&self) -> i64 {
        self.expires_at_ms
    }

    /// Whether the identity is still inside its validity window at `now_ms`.
    ///
    /// The expiry instant itself is still valid.
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        now_ms <= self.expires_at_ms
    }
}

/// The fixed identity internal tokens are minted for, with its lifetime.
///
/// Validated once at startup so that minting a system token cannot fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemIdentity {
    username: String,
    lifetime_ms: i64,
}

impl SystemIdentity {
    pub fn new(username: impl Into<String>, lifetime_ms: i64) -> Result<Self, ClaimsError> {
        let username = username.into();
        check_len("username", &username)?;
        if lifetime_ms <= 0 {
            return Err(ClaimsError::InvalidWindow {
                issued_at_ms: 0,
                expires_at_ms: lifetime_ms,
            });
        }
        Ok(Self {
            username,
            lifetime_ms,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn lifetime_ms(&self) -> i64 {
        self.lifetime_ms
    }

    /// Identity issued at `now_ms`, no groups.
    pub fn identity_at(&self, now_ms: i64) -> Identity {
        let issued_at_ms = now_ms.min(i64::MAX - self.lifetime_ms);
        Identity {
            username: self.username.clone(),
            groups: BTreeSet::new(),
            issued_at_ms,
            expires_at_ms: issued_at_ms + self.lifetime_ms,
        }
    }
}

fn check_len(field: &'static str, value: &str) -> Result<(), ClaimsError> {
    if value.len() > MAX_FIELD_LEN {
        return Err(ClaimsError::FieldTooLong {
            field,
            len: value.len(),
            max: MAX_FIELD_LEN,
        });
    }
    Ok(())
}
