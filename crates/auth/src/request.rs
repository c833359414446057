//! Caller identity as seen by the boundary layer for one inbound call.
//!
//! The boundary builds a [`RequestContext`] from request headers and hands it
//! to every function that needs to know who is calling. It is a plain value:
//! nothing is stashed in thread-locals, so a request whose header and body
//! are processed on different threads still carries the same identity.

/// Header carrying the end user's id, set by the router.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the end user's IP address, set by the router.
pub const USER_IP_HEADER: &str = "x-user-ip";

#[derive(Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    user_id: Option<String>,
    user_ip: Option<String>,
    credential: Option<String>,
}

impl RequestContext {
    /// Context for work not triggered by a request (timers, caches, workers).
    pub fn background() -> Self {
        Self::default()
    }

    pub fn new(
        user_id: Option<String>,
        user_ip: Option<String>,
        credential: Option<String>,
    ) -> Self {
        Self {
            user_id: non_empty(user_id),
            user_ip: non_empty(user_ip),
            credential: non_empty(credential),
        }
    }

    /// Build from raw header values.
    ///
    /// The credential is everything after the first space of the trimmed
    /// `Authorization` value, whatever the scheme. A value without a space is
    /// logged and ignored.
    pub fn from_headers(
        user_id: Option<&str>,
        user_ip: Option<&str>,
        authorization: Option<&str>,
    ) -> Self {
        tracing::trace!(
            user_id = ?user_id,
            user_ip = ?user_ip,
            authorization_len = ?authorization.map(str::len),
            "seeding request context"
        );

        let credential = authorization.and_then(|value| match value.trim().split_once(' ') {
            Some((_scheme, credential)) => Some(credential.trim().to_string()),
            None => {
                tracing::warn!(
                    user_id = ?user_id,
                    user_ip = ?user_ip,
                    "invalid Authorization header format"
                );
                None
            }
        });

        Self::new(
            user_id.map(str::to_string),
            user_ip.map(str::to_string),
            credential,
        )
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn user_ip(&self) -> Option<&str> {
        self.user_ip.as_deref()
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }
}

impl core::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RequestContext")
            .field("user_id", &self.user_id)
            .field("user_ip", &self.user_ip)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
