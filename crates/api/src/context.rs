use axum::http::{HeaderMap, header::AUTHORIZATION};

use keystone_auth::{RequestContext, USER_ID_HEADER, USER_IP_HEADER};
use keystone_core::RequestId;

/// Identity context for one inbound call.
///
/// Carried in the request's extensions, so it travels with the request
/// through every layer and handler regardless of which worker polls it.
#[derive(Debug, Clone)]
pub struct CallContext {
    request_id: RequestId,
    request: RequestContext,
}

impl CallContext {
    pub fn new(request_id: RequestId, request: RequestContext) -> Self {
        Self {
            request_id,
            request,
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        let request = RequestContext::from_headers(
            header_str(headers, USER_ID_HEADER),
            header_str(headers, USER_IP_HEADER),
            header_str(headers, AUTHORIZATION.as_str()),
        );
        Self::new(RequestId::new(), request)
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn request(&self) -> &RequestContext {
        &self.request
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
