// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use boardsync_core::SyncError;
use serde_json::json;
use tracing::{error, warn};

/// Errors returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Webhook secret missing or wrong.
    #[error("unauthorized")]
    Unauthorized,

    /// Request body is not a usable payload.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Sync or store failure while processing the request.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => {
                warn!("Unauthorized webhook request");
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "status": "unauthorized" })),
                )
                    .into_response()
            }
            Self::InvalidPayload(message) => {
                warn!(message = %message, "Invalid request payload");
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "status": "invalid_payload", "message": message })),
                )
                    .into_response()
            }
            Self::Sync(e) => {
                error!(error = %e, "Request processing failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "status": "error", "message": e.to_string() })),
                )
                    .into_response()
            }
        }
    }
}
