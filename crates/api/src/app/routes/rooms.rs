use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use labdesk_infra::services::ReservationRequest;

use crate::app::{AppServices, dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rooms))
        .route("/:key", get(get_room))
        .route("/:key/availability", get(availability))
        .route("/:key/reservations", post(create_reservation))
}

pub async fn list_rooms(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::WindowParams>,
) -> axum::response::Response {
    let window = match (params.start, params.end) {
        (Some(start), Some(end)) => Some((start, end)),
        (None, None) => None,
        _ => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_window",
                "start and end must be given together",
            );
        }
    };
    match services.reservations.room_overview(window).await {
        Ok(rooms) => (StatusCode::OK, Json(rooms)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_room(
    Extension(services): Extension<Arc<AppServices>>,
    Path(key): Path<String>,
) -> axum::response::Response {
    let now = services.reservations.now();
    match services.reservations.room_detail(&key).await {
        Ok(detail) => (
            StatusCode::OK,
            Json(dto::RoomDetailView {
                room: detail.room,
                upcoming: detail
                    .upcoming
                    .iter()
                    .map(|r| dto::ReservationView::new(r, now))
                    .collect(),
            }),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn availability(
    Extension(services): Extension<Arc<AppServices>>,
    Path(key): Path<String>,
    Query(params): Query<dto::AvailabilityParams>,
) -> axum::response::Response {
    match services
        .reservations
        .availability(&key, params.start, params.end, params.exclude)
        .await
    {
        Ok(available) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "room_key": key,
                "start": params.start,
                "end": params.end,
                "available": available,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_reservation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(key): Path<String>,
    Json(body): Json<dto::ReservationRequest>,
) -> axum::response::Response {
    let req = ReservationRequest {
        room_key: key,
        start: body.start,
        end: body.end,
        purpose: body.purpose,
    };
    match services.reservations.create(user.user_id(), req).await {
        Ok(r) => (
            StatusCode::CREATED,
            Json(dto::ReservationView::new(&r, services.reservations.now())),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
