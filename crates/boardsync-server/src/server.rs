// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP routes.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /webhook` | board events (handshake, item create/update/delete) |
//! | `POST /sync` | manual sync: `{"direction": ..., "entity_type": ...}` |
//! | `GET /health` | liveness plus a database ping |

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use boardsync_core::{Store, SyncEngine};
use boardsync_core::sync::{Direction, Scope, SyncOptions};
use serde::Deserialize;
use serde_json::{Value, json};
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::webhook::{self, WebhookPayload};

/// Shared handler state.
pub struct AppState {
    pub engine: SyncEngine,
    /// Expected `Authorization` header value, if webhooks are authenticated.
    pub webhook_secret: Option<String>,
    /// Serializes sync runs from webhooks, `/sync` and the scheduler.
    pub sync_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(engine: SyncEngine, webhook_secret: Option<String>) -> Self {
        Self {
            engine,
            webhook_secret,
            sync_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Build the router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(handle_webhook))
        .route("/sync", post(manual_sync))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "HTTP server listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    match state.engine.store().ping().await {
        Ok(()) => Json(json!({ "status": "healthy", "database": "ok" })).into_response(),
        Err(e) => {
            warn!(error = %e, "Health check database ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "database": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let is_authorized = authorized(state.webhook_secret.as_deref(), &headers);
    let parsed = serde_json::from_slice::<Value>(&body)
        .map_err(|e| ApiError::InvalidPayload(format!("body is not JSON: {}", e)))
        .and_then(|payload| webhook::parse_payload(&payload));

    // Only the subscription handshake is answered before authentication
    let event = match parsed {
        Ok(WebhookPayload::Challenge(challenge)) => {
            return Ok(Json(json!({ "challenge": challenge })).into_response());
        }
        _ if !is_authorized => return Err(ApiError::Unauthorized),
        Err(e) => return Err(e),
        Ok(WebhookPayload::Unsupported(event_type)) => {
            info!(event_type = %event_type, "Ignoring unsupported webhook event");
            return Ok(
                Json(json!({ "status": "ignored", "reason": "unsupported event" }))
                    .into_response(),
            );
        }
        Ok(WebhookPayload::Event(event)) => event,
    };

    let _guard = state.sync_lock.lock().await;
    let outcome = webhook::dispatch(&state.engine, &event).await?;

    let mut body = serde_json::to_value(&outcome).unwrap_or_else(|_| json!({}));
    body["status"] = json!("success");
    Ok(Json(body).into_response())
}

/// Compare the `Authorization` header with the secret in constant time.
fn authorized(secret: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(secret) = secret else {
        return true;
    };
    headers
        .get(header::AUTHORIZATION)
        .is_some_and(|value| bool::from(value.as_bytes().ct_eq(secret.as_bytes())))
}

#[derive(Debug, Default, Deserialize)]
struct SyncRequest {
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    entity_type: Option<String>,
}

async fn manual_sync(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request: SyncRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SyncRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::InvalidPayload(format!("invalid sync request: {}", e)))?
    };

    let direction: Direction = request
        .direction
        .as_deref()
        .unwrap_or("both")
        .parse()
        .map_err(ApiError::InvalidPayload)?;
    let scope: Scope = request
        .entity_type
        .as_deref()
        .unwrap_or("all")
        .parse()
        .map_err(ApiError::InvalidPayload)?;

    info!(direction = %direction, scope = ?scope, "Manual sync requested");
    let _guard = state.sync_lock.lock().await;
    let reports = state
        .engine
        .run(direction, scope, &SyncOptions::default())
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Sync completed",
        "reports": reports,
    })))
}
