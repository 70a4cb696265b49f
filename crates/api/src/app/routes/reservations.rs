use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use labdesk_core::ReservationId;
use labdesk_infra::ReservationQuery;
use labdesk_infra::services::ReservationChanges;

use crate::app::{AppServices, dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_reservations))
        .route(
            "/:id",
            get(get_reservation)
                .put(update_reservation)
                .delete(delete_reservation),
        )
        .route("/:id/cancel", post(cancel_reservation))
        .route("/:id/confirm", post(confirm_reservation))
}

fn parse_reservation_id(raw: &str) -> Result<ReservationId, axum::response::Response> {
    raw.parse().map_err(|_| errors::invalid_id("reservation"))
}

pub async fn list_reservations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Query(params): Query<dto::ReservationListParams>,
) -> axum::response::Response {
    let query = ReservationQuery::from_params(params.status.as_deref(), params.show_past());
    match services
        .reservations
        .list(user.user_id(), &query, params.page())
        .await
    {
        Ok(page) => (
            StatusCode::OK,
            Json(dto::reservation_page(page, services.reservations.now())),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_reservation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_reservation_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.reservations.get(user.user_id(), id).await {
        Ok(r) => (
            StatusCode::OK,
            Json(dto::ReservationView::new(&r, services.reservations.now())),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_reservation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReservationRequest>,
) -> axum::response::Response {
    let id = match parse_reservation_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let changes = ReservationChanges {
        start: body.start,
        end: body.end,
        purpose: body.purpose,
    };
    match services.reservations.update(user.user_id(), id, changes).await {
        Ok(r) => (
            StatusCode::OK,
            Json(dto::ReservationView::new(&r, services.reservations.now())),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn cancel_reservation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_reservation_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let now = services.reservations.now();
    match services.reservations.cancel(user.user_id(), id).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "cancelled": outcome.cancelled,
                "reservation": dto::ReservationView::new(&outcome.reservation, now),
                "calendar_warning": outcome.calendar_warning,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn confirm_reservation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_reservation_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let now = services.reservations.now();
    match services.reservations.confirm(user.user_id(), id).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "confirmed": outcome.confirmed,
                "reservation": dto::ReservationView::new(&outcome.reservation, now),
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_reservation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_reservation_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.reservations.delete(user.user_id(), id).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
