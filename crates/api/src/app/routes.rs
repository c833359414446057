use std::sync::Arc;

use axum::{Extension, Json};
use serde::Serialize;
use serde_json::{Value, json};

use keystone_auth::{Principal, PrincipalType};

use crate::app::AppServices;
use crate::context::CallContext;

#[derive(Debug, Serialize)]
pub struct PrincipalView {
    pub name: String,
    #[serde(rename = "type")]
    pub principal_type: PrincipalType,
    pub has_credential: bool,
}

impl From<&Principal> for PrincipalView {
    fn from(principal: &Principal) -> Self {
        Self {
            name: principal.name().to_string(),
            principal_type: principal.principal_type(),
            has_credential: principal.credential().is_some(),
        }
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Who this process would act as for the current call.
pub async fn principal(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(call): Extension<CallContext>,
) -> Json<PrincipalView> {
    let principal = services.auth_context.get_principal(call.request());
    Json(PrincipalView::from(&principal))
}

/// Echo the verified internal caller.
pub async fn whoami(Extension(principal): Extension<Principal>) -> Json<PrincipalView> {
    Json(PrincipalView::from(&principal))
}
