use axum::{Router, routing::get};
use crate::{AppState, controllers::status_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/health", get(status_controller::health))
        .route("/health/db", get(status_controller::health_db))
        .route("/sources", get(status_controller::sources))
}
