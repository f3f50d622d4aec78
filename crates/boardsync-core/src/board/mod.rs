// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Board service access.
//!
//! [`BoardApi`] abstracts the remote board service so the sync engine can run
//! against the GraphQL API ([`MondayClient`]) or an in-process fake
//! ([`InMemoryBoard`]).

mod client;
mod memory;

pub use client::MondayClient;
pub use memory::{BoardCall, InMemoryBoard};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Account, BoardItem, WebhookSubscription};

/// Items requested per page.
pub const PAGE_SIZE: u32 = 250;

/// Value written to a board column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnInput {
    /// Plain text, sent as a JSON string.
    Text(String),
    /// Clears the column.
    Empty,
}

impl ColumnInput {
    /// Encode the value the way `change_column_value` expects it.
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    /// Value placed in a `create_item` column map.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Empty => serde_json::Value::String(String::new()),
        }
    }
}

impl From<&str> for ColumnInput {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

impl From<String> for ColumnInput {
    fn from(s: String) -> Self {
        if s.is_empty() { Self::Empty } else { Self::Text(s) }
    }
}

/// Remote board service.
#[async_trait]
pub trait BoardApi: Send + Sync {
    /// Fetch every item of a board, following the page cursor.
    ///
    /// Only `column_ids` are requested when non-empty. Stops after
    /// `max_pages` pages when given. Items repeated across pages are dropped.
    async fn fetch_items(
        &self,
        board_id: &str,
        column_ids: &[String],
        max_pages: Option<u32>,
    ) -> Result<Vec<BoardItem>>;

    /// Fetch one item with all its columns, or `None` when it does not exist.
    async fn get_item(&self, item_id: &str) -> Result<Option<BoardItem>>;

    /// Create an item and return its id.
    async fn create_item(
        &self,
        board_id: &str,
        name: &str,
        columns: &[(String, ColumnInput)],
    ) -> Result<String>;

    /// Overwrite one column of an item.
    async fn change_column_value(
        &self,
        board_id: &str,
        item_id: &str,
        column_id: &str,
        value: &ColumnInput,
    ) -> Result<()>;

    /// Account the token belongs to (connectivity check).
    async fn me(&self) -> Result<Account>;

    /// Webhook subscriptions of a board.
    async fn list_webhooks(&self, board_id: &str) -> Result<Vec<WebhookSubscription>>;

    /// Subscribe `url` to `event` on a board.
    async fn create_webhook(
        &self,
        board_id: &str,
        event: &str,
        url: &str,
    ) -> Result<WebhookSubscription>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_input_encoding() {
        assert_eq!(ColumnInput::from("Jane").to_json(), "\"Jane\"");
        assert_eq!(
            ColumnInput::from("say \"hi\"").to_json(),
            r#""say \"hi\"""#
        );
        assert_eq!(ColumnInput::from("").to_json(), "\"\"");
        assert_eq!(ColumnInput::from("Done").to_value(), serde_json::json!("Done"));
    }
}
