use axum::{Router, routing::get};

pub mod account;
pub mod categories;
pub mod inventory;
pub mod reservations;
pub mod rooms;
pub mod system;

/// Router for all authenticated (user-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/inventory", inventory::router())
        .nest("/categories", categories::router())
        .nest("/rooms", rooms::router())
        .nest("/reservations", reservations::router())
        .nest("/account", account::router())
}
