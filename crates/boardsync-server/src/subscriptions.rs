// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Webhook subscription bootstrap.

use boardsync_core::board::BoardApi;
use boardsync_core::config::BoardIds;
use boardsync_core::models::WebhookSubscription;
use tracing::{error, info};

/// Events subscribed on every synchronized board.
pub const WEBHOOK_EVENTS: &[&str] = &["create_item", "update_item", "delete_item"];

/// Make sure both boards deliver create, update and delete events to `url`.
///
/// Existing subscriptions are matched on board and event, and on the URL
/// when the API reports one. Returns the number of subscriptions created.
/// A failed creation is logged and does not stop the remaining ones.
pub async fn ensure_webhooks(
    board: &dyn BoardApi,
    boards: &BoardIds,
    url: &str,
) -> boardsync_core::Result<usize> {
    let mut created = 0;
    for board_id in [boards.users.as_str(), boards.projects.as_str()] {
        let existing = board.list_webhooks(board_id).await?;
        for event in WEBHOOK_EVENTS {
            if existing.iter().any(|w| covers(w, event, url)) {
                info!(board_id, event, "Webhook already exists");
                continue;
            }
            match board.create_webhook(board_id, event, url).await {
                Ok(subscription) => {
                    created += 1;
                    info!(board_id, event, webhook_id = %subscription.id, "Created webhook");
                }
                Err(e) => error!(board_id, event, error = %e, "Failed to create webhook"),
            }
        }
    }
    Ok(created)
}

fn covers(subscription: &WebhookSubscription, event: &str, url: &str) -> bool {
    subscription.event == event
        && subscription
            .url
            .as_deref()
            .is_none_or(|configured| configured.contains(url))
}
