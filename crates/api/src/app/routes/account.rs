use std::sync::Arc;

use axum::{
    Json, Router, extract::Extension, http::StatusCode, response::IntoResponse, routing::delete,
};

use crate::app::{AppServices, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new().route("/", delete(delete_account))
}

/// Remove everything the caller owns. Identity lives with the token issuer.
pub async fn delete_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    match services.account.remove_user(user.user_id()).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
