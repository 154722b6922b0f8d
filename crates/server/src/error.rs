// SPDX-License-Identifier: MIT

//! A single error type at the HTTP boundary, converting every internal
//! failure into a `{error}` JSON body with the right status code — the
//! same error-taxonomy-to-boundary-conversion shape this pack's CLI takes
//! converting internal errors into exit codes (`oj::exit_error::ExitError`).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),
    #[error("job {0} not found")]
    NotFound(low_tide_core::JobId),
    #[error("job {0} is running, cannot clean up")]
    Conflict(low_tide_core::JobId),
    #[error(transparent)]
    Store(#[from] low_tide_store::StoreError),
    #[error(transparent)]
    Config(#[from] low_tide_config::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_) | ServerError::Config(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Store(_) | ServerError::Io(_) | ServerError::Zip(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
