// SPDX-License-Identifier: MIT

mod jobs;
mod ws;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/jobs", get(jobs::list_jobs).post(jobs::create_jobs))
        .route("/api/jobs/:id", get(jobs::get_job))
        .route("/api/jobs/:id/logs", get(jobs::get_logs))
        .route("/api/jobs/:id/retry", post(jobs::retry_job))
        .route("/api/jobs/:id/cancel", post(jobs::cancel_job))
        .route("/api/jobs/:id/archive", post(jobs::archive_job))
        .route("/api/jobs/:id/cleanup", post(jobs::cleanup_job))
        .route("/api/jobs/:id/delete", post(jobs::delete_job))
        .route("/api/jobs/:id/files/:fid", get(jobs::get_file))
        .route("/api/jobs/:id/zip", get(jobs::get_zip))
        .route("/thumbnails/:id", get(jobs::get_thumbnail))
        .route("/ws/state", get(ws::upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
