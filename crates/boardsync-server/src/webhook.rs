// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Board webhook parsing and dispatch.
//!
//! The board service posts `{"event": {"type", "boardId", "pulseId", ...}}`.
//! Item creations and updates pull that one item from the owning board;
//! deletions soft-delete the correlated local record. A `{"challenge": ...}`
//! body is the subscription handshake and is echoed back unchanged.

use boardsync_core::sync::{DeleteOutcome, ItemPullOutcome, SyncReport};
use boardsync_core::{EntityType, SyncEngine};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::ApiError;

/// Event types that pull the announced item.
const PULL_EVENTS: &[&str] = &[
    "create_item",
    "update_item",
    "change_column_value",
    "create_pulse",
    "update_column_value",
    "update_name",
];

/// Event types that soft-delete the correlated record.
const DELETE_EVENTS: &[&str] = &["delete_item", "delete_pulse", "item_deleted"];

/// One board event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub event_type: String,
    pub board_id: String,
    pub item_id: String,
}

/// A parsed webhook body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookPayload {
    /// Subscription handshake.
    Challenge(Value),
    /// An event that needs processing.
    Event(WebhookEvent),
    /// An event type that is not synchronized.
    Unsupported(String),
}

/// What the dispatcher did with an event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// The announced item was pulled.
    Pulled { report: SyncReport },
    /// The correlated local record was deactivated.
    Deactivated { entity_type: EntityType, local_id: String },
    /// Nothing to do.
    Ignored { reason: String },
}

/// Parse a webhook body.
pub fn parse_payload(body: &Value) -> Result<WebhookPayload, ApiError> {
    if let Some(challenge) = body.get("challenge") {
        return Ok(WebhookPayload::Challenge(challenge.clone()));
    }

    let event = body.get("event").unwrap_or(&Value::Null);
    let event_type = event
        .get("type")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::InvalidPayload("missing event type".into()))?;

    if !PULL_EVENTS.contains(&event_type) && !DELETE_EVENTS.contains(&event_type) {
        return Ok(WebhookPayload::Unsupported(event_type.to_string()));
    }

    let (Some(board_id), Some(item_id)) = (
        id_value(event.get("boardId")),
        id_value(event.get("pulseId")),
    ) else {
        return Err(ApiError::InvalidPayload("missing board or item id".into()));
    };

    Ok(WebhookPayload::Event(WebhookEvent {
        event_type: event_type.to_string(),
        board_id,
        item_id,
    }))
}

/// Board ids arrive as numbers or strings.
fn id_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Apply one event to the engine.
pub async fn dispatch(engine: &SyncEngine, event: &WebhookEvent) -> Result<WebhookOutcome, ApiError> {
    info!(
        event_type = %event.event_type,
        board_id = %event.board_id,
        item_id = %event.item_id,
        "Processing webhook event"
    );

    if DELETE_EVENTS.contains(&event.event_type.as_str()) {
        let outcome = engine.handle_delete(&event.board_id, &event.item_id).await?;
        return Ok(match outcome {
            DeleteOutcome::Deactivated {
                entity_type,
                local_id,
            } => WebhookOutcome::Deactivated {
                entity_type,
                local_id,
            },
            DeleteOutcome::UnknownBoard => ignored("unknown board"),
            DeleteOutcome::NotCorrelated => ignored("item not synchronized"),
        });
    }

    Ok(match engine.pull_item(&event.board_id, &event.item_id).await? {
        ItemPullOutcome::Pulled(report) => WebhookOutcome::Pulled { report },
        ItemPullOutcome::UnknownBoard => ignored("unknown board"),
        ItemPullOutcome::NotFound => ignored("item not found on board"),
    })
}

fn ignored(reason: &str) -> WebhookOutcome {
    WebhookOutcome::Ignored {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_challenge() {
        let payload = parse_payload(&json!({ "challenge": "abc123" })).unwrap();
        assert_eq!(payload, WebhookPayload::Challenge(json!("abc123")));
    }

    #[test]
    fn test_parse_numeric_ids() {
        let payload = parse_payload(&json!({
            "event": { "type": "update_item", "boardId": 5764059860u64, "pulseId": 42 }
        }))
        .unwrap();
        assert_eq!(
            payload,
            WebhookPayload::Event(WebhookEvent {
                event_type: "update_item".into(),
                board_id: "5764059860".into(),
                item_id: "42".into(),
            })
        );
    }

    #[test]
    fn test_parse_rejects_missing_type() {
        assert!(matches!(
            parse_payload(&json!({ "event": { "boardId": "1", "pulseId": "2" } })),
            Err(ApiError::InvalidPayload(_))
        ));
        assert!(matches!(
            parse_payload(&json!({})),
            Err(ApiError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_parse_rejects_missing_ids() {
        assert!(matches!(
            parse_payload(&json!({ "event": { "type": "delete_item", "boardId": "1" } })),
            Err(ApiError::InvalidPayload(_))
        ));
        assert!(matches!(
            parse_payload(&json!({ "event": { "type": "create_item", "boardId": "", "pulseId": "2" } })),
            Err(ApiError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_parse_unsupported_type() {
        let payload = parse_payload(&json!({ "event": { "type": "create_update" } })).unwrap();
        assert_eq!(payload, WebhookPayload::Unsupported("create_update".into()));
    }
}
