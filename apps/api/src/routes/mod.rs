pub mod export;
pub mod health;

use axum::{routing::get, routing::post, Router};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/export/resume", post(export::export_resume))
        .route(
            "/api/v1/export/cover-letter",
            post(export::export_cover_letter),
        )
        .with_state(state)
}
