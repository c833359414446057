//! Error kinds for minting, transporting and enforcing internal tokens.
//!
//! None of these are retried: a forged, expired or malformed credential does
//! not become valid on a second attempt.

use thiserror::Error;

use crate::principal::PrincipalType;

/// An [`Identity`](crate::Identity) or token could not be constructed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("invalid validity window (expires_at {expires_at_ms} <= issued_at {issued_at_ms})")]
    InvalidWindow { issued_at_ms: i64, expires_at_ms: i64 },

    #[error("{field} is {len} bytes, limit is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{count} groups, limit is {max}")]
    TooManyGroups { count: usize, max: usize },
}

/// Structural failure while decoding token bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedToken {
    #[error("empty token")]
    Empty,

    #[error("unsupported token version {0}")]
    UnsupportedVersion(u8),

    #[error("token truncated while reading {0}")]
    Truncated(&'static str),

    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    #[error("duplicate group '{0}'")]
    DuplicateGroup(String),

    #[error("invalid identity: {0}")]
    InvalidIdentity(#[from] ClaimsError),

    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
}

/// Why a decoded token failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenState {
    /// No retained secret produced the token's signature.
    SignatureMismatch,
    /// The token's validity window has passed.
    Expired,
}

impl core::fmt::Display for TokenState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::SignatureMismatch => f.write_str("signature mismatch"),
            Self::Expired => f.write_str("expired"),
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid token: {reason}")]
pub struct InvalidToken {
    pub reason: TokenState,
}

impl InvalidToken {
    pub fn signature_mismatch() -> Self {
        Self {
            reason: TokenState::SignatureMismatch,
        }
    }

    pub fn expired() -> Self {
        Self {
            reason: TokenState::Expired,
        }
    }
}

/// Why an internal caller was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenialReason {
    /// Credential missing, not base64, or not a decodable token.
    MalformedCredential,
    /// Token signature not produced by any retained secret.
    Signature,
    Expired,
    /// Validly signed, but not for the system identity.
    WrongIdentity,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedCredential => "malformed_credential",
            Self::Signature => "signature",
            Self::Expired => "expired",
            Self::WrongIdentity => "wrong_identity",
        }
    }
}

impl core::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TokenState> for DenialReason {
    fn from(value: TokenState) -> Self {
        match value {
            TokenState::SignatureMismatch => Self::Signature,
            TokenState::Expired => Self::Expired,
        }
    }
}

/// Enforcement-time failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("access denied: {reason}")]
    Denied { reason: DenialReason },

    /// The enforcer was handed a principal it must never see. This is a wiring
    /// bug in the caller, not an authorization outcome.
    #[error("internal access enforcement invoked for {principal_type} principal '{name}'")]
    IllegalCallerType {
        name: String,
        principal_type: PrincipalType,
    },
}

impl AccessError {
    pub fn denied(reason: DenialReason) -> Self {
        Self::Denied { reason }
    }

    pub fn denial_reason(&self) -> Option<DenialReason> {
        match self {
            Self::Denied { reason } => Some(*reason),
            Self::IllegalCallerType { .. } => None,
        }
    }
}

impl From<InvalidToken> for AccessError {
    fn from(value: InvalidToken) -> Self {
        Self::denied(value.reason.into())
    }
}

/// Outbound credential lookup failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteAuthError {
    #[error("principal '{0}' carries no credential")]
    MissingCredential(String),
}
