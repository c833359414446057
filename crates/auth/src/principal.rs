use serde::{Deserialize, Serialize};

/// Kind of caller a [`Principal`] stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrincipalType {
    User,
    Group,
    Role,
    /// Another platform component, authenticated by a minted token.
    Internal,
}

impl core::fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::User => f.write_str("USER"),
            Self::Group => f.write_str("GROUP"),
            Self::Role => f.write_str("ROLE"),
            Self::Internal => f.write_str("INTERNAL"),
        }
    }
}

/// The resolved caller of the current operation.
///
/// Built fresh for every call. For [`PrincipalType::Internal`] the credential
/// is a base64-encoded access token; for users it is whatever bearer value
/// the boundary layer received.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    name: String,
    #[serde(rename = "type")]
    principal_type: PrincipalType,
    /// Never crosses a serde boundary in either direction.
    #[serde(skip)]
    credential: Option<String>,
}

impl Principal {
    pub fn new(
        name: impl Into<String>,
        principal_type: PrincipalType,
        credential: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            principal_type,
            credential,
        }
    }

    pub fn user(name: impl Into<String>, credential: Option<String>) -> Self {
        Self::new(name, PrincipalType::User, credential)
    }

    pub fn internal(name: impl Into<String>, credential: impl Into<String>) -> Self {
        Self::new(name, PrincipalType::Internal, Some(credential.into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn principal_type(&self) -> PrincipalType {
        self.principal_type
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn is_internal(&self) -> bool {
        self.principal_type == PrincipalType::Internal
    }
}

// Credentials are bearer secrets; keep them out of logs.
impl core::fmt::Debug for Principal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Principal")
            .field("name", &self.name)
            .field("type", &self.principal_type)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl core::fmt::Display for Principal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.principal_type, self.name)
    }
}
