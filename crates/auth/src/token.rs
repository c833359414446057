use crate::error::ClaimsError;
use crate::identity::{Identity, MAX_FIELD_LEN};

/// A signed [`Identity`].
///
/// A plain value: two tokens are the same token when their fields are equal.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AccessToken {
    identity: Identity,
    signature: Vec<u8>,
}

impl AccessToken {
    pub fn new(identity: Identity, signature: Vec<u8>) -> Result<Self, ClaimsError> {
        if signature.len() > MAX_FIELD_LEN {
            return Err(ClaimsError::FieldTooLong {
                field: "signature",
                len: signature.len(),
                max: MAX_FIELD_LEN,
            });
        }
        Ok(Self {
            identity,
            signature,
        })
    }

    /// Signature length is bounded by the MAC output size here.
    pub(crate) fn from_parts(identity: Identity, signature: Vec<u8>) -> Self {
        debug_assert!(signature.len() <= MAX_FIELD_LEN);
        Self {
            identity,
            signature,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}

impl core::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccessToken")
            .field("identity", &self.identity)
            .field("signature", &format_args!("<{} bytes>", self.signature.len()))
            .finish()
    }
}
