use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use labdesk_core::ItemId;
use labdesk_infra::services::NewItem;

use crate::app::{AppServices, dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/:id", get(get_item).put(update_item).delete(delete_item))
        .route("/low-stock", get(low_stock))
        .route("/suggestions", get(suggestions))
}

fn parse_item_id(raw: &str) -> Result<ItemId, axum::response::Response> {
    raw.parse().map_err(|_| errors::invalid_id("item"))
}

fn new_item(body: dto::ItemRequest) -> NewItem {
    NewItem {
        name: body.name,
        quantity: body.quantity,
        category: body.category,
    }
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Query(params): Query<dto::ItemListParams>,
) -> axum::response::Response {
    let filter = match params.into_filter() {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    match services.inventory.list_items(user.user_id(), &filter).await {
        Ok(listing) => (StatusCode::OK, Json(listing)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<dto::ItemRequest>,
) -> axum::response::Response {
    match services
        .inventory
        .create_item(user.user_id(), new_item(body))
        .await
    {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_item_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.inventory.get_item(user.user_id(), id).await {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ItemRequest>,
) -> axum::response::Response {
    let id = match parse_item_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .inventory
        .update_item(user.user_id(), id, new_item(body))
        .await
    {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_item_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.inventory.delete_item(user.user_id(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Query(params): Query<dto::LowStockParams>,
) -> axum::response::Response {
    let threshold = params
        .threshold
        .unwrap_or(services.inventory.low_stock_threshold());
    match services
        .inventory
        .low_stock(user.user_id(), Some(threshold))
        .await
    {
        Ok(items) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "threshold": threshold,
                "items": items,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn suggestions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Query(params): Query<dto::SuggestionParams>,
) -> axum::response::Response {
    match services.inventory.suggestions(user.user_id(), &params.q).await {
        Ok(names) => (StatusCode::OK, Json(names)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
