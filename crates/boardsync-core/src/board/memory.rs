// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-process board service for tests and offline runs.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::{BoardApi, ColumnInput};
use crate::error::{Result, SyncError};
use crate::models::{Account, BoardItem, ColumnValue, WebhookSubscription};

/// A mutating call received by [`InMemoryBoard`].
#[derive(Debug, Clone, PartialEq)]
pub enum BoardCall {
    CreateItem {
        board_id: String,
        name: String,
        columns: Vec<(String, ColumnInput)>,
    },
    ChangeColumnValue {
        board_id: String,
        item_id: String,
        column_id: String,
        value: ColumnInput,
    },
    CreateWebhook {
        board_id: String,
        event: String,
        url: String,
    },
}

#[derive(Default)]
struct State {
    boards: BTreeMap<String, Vec<BoardItem>>,
    webhooks: Vec<WebhookSubscription>,
    calls: Vec<BoardCall>,
    fetches: u32,
    failing_columns: HashSet<String>,
    failing_items: HashSet<String>,
}

/// Board service backed by memory.
///
/// Pages are served `page_size` items at a time so cursor handling is
/// exercised. Mutations are applied and recorded in [`InMemoryBoard::calls`].
pub struct InMemoryBoard {
    state: Mutex<State>,
    page_size: usize,
    next_id: AtomicU64,
}

impl Default for InMemoryBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBoard {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: 250,
            next_id: AtomicU64::new(1_000_000),
        }
    }

    /// Serve fetches in pages of `page_size` items.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Replace the items of a board.
    pub fn set_items(&self, board_id: &str, items: Vec<BoardItem>) {
        self.lock().boards.insert(board_id.to_string(), items);
    }

    /// Append an item to a board.
    pub fn push_item(&self, board_id: &str, item: BoardItem) {
        self.lock()
            .boards
            .entry(board_id.to_string())
            .or_default()
            .push(item);
    }

    /// Current items of a board.
    pub fn items(&self, board_id: &str) -> Vec<BoardItem> {
        self.lock().boards.get(board_id).cloned().unwrap_or_default()
    }

    /// Mutations received so far.
    pub fn calls(&self) -> Vec<BoardCall> {
        self.lock().calls.clone()
    }

    /// Number of `fetch_items` calls served.
    pub fn fetch_count(&self) -> u32 {
        self.lock().fetches
    }

    /// Make `change_column_value` and `create_item` fail for a column.
    pub fn fail_column(&self, column_id: &str) {
        self.lock().failing_columns.insert(column_id.to_string());
    }

    /// Make `get_item` fail for an item.
    pub fn fail_item(&self, item_id: &str) {
        self.lock().failing_items.insert(item_id.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // Poisoning only happens if a test panicked mid-call
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BoardApi for InMemoryBoard {
    async fn fetch_items(
        &self,
        board_id: &str,
        column_ids: &[String],
        max_pages: Option<u32>,
    ) -> Result<Vec<BoardItem>> {
        let mut state = self.lock();
        state.fetches += 1;
        let items = state
            .boards
            .get(board_id)
            .ok_or_else(|| SyncError::Payload(format!("board {} not found", board_id)))?;

        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for (page, chunk) in items.chunks(self.page_size).enumerate() {
            if max_pages.is_some_and(|max| page as u32 >= max) {
                break;
            }
            for item in chunk {
                if !seen.insert(item.id.clone()) {
                    continue;
                }
                let mut item = item.clone();
                if !column_ids.is_empty() {
                    item.column_values.retain(|c| column_ids.contains(&c.id));
                }
                result.push(item);
            }
        }
        Ok(result)
    }

    async fn get_item(&self, item_id: &str) -> Result<Option<BoardItem>> {
        let state = self.lock();
        if state.failing_items.contains(item_id) {
            return Err(SyncError::Transient(format!("item {} unavailable", item_id)));
        }
        Ok(state
            .boards
            .values()
            .flatten()
            .find(|i| i.id == item_id)
            .cloned())
    }

    async fn create_item(
        &self,
        board_id: &str,
        name: &str,
        columns: &[(String, ColumnInput)],
    ) -> Result<String> {
        let mut state = self.lock();
        if let Some((column, _)) = columns
            .iter()
            .find(|(c, _)| state.failing_columns.contains(c))
        {
            return Err(SyncError::Payload(format!("column {} rejected", column)));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        state.calls.push(BoardCall::CreateItem {
            board_id: board_id.to_string(),
            name: name.to_string(),
            columns: columns.to_vec(),
        });
        let item = BoardItem::new(
            id.clone(),
            name,
            columns
                .iter()
                .map(|(c, v)| ColumnValue {
                    id: c.clone(),
                    text: column_text(v),
                    value: Some(v.to_json()),
                })
                .collect(),
        );
        state
            .boards
            .entry(board_id.to_string())
            .or_default()
            .push(item);
        Ok(id)
    }

    async fn change_column_value(
        &self,
        board_id: &str,
        item_id: &str,
        column_id: &str,
        value: &ColumnInput,
    ) -> Result<()> {
        let mut state = self.lock();
        if state.failing_columns.contains(column_id) {
            return Err(SyncError::Payload(format!("column {} rejected", column_id)));
        }
        state.calls.push(BoardCall::ChangeColumnValue {
            board_id: board_id.to_string(),
            item_id: item_id.to_string(),
            column_id: column_id.to_string(),
            value: value.clone(),
        });

        let item = state
            .boards
            .get_mut(board_id)
            .and_then(|items| items.iter_mut().find(|i| i.id == item_id))
            .ok_or_else(|| SyncError::Payload(format!("item {} not found", item_id)))?;
        let cell = ColumnValue {
            id: column_id.to_string(),
            text: column_text(value),
            value: Some(value.to_json()),
        };
        match item.column_values.iter_mut().find(|c| c.id == column_id) {
            Some(existing) => *existing = cell,
            None => item.column_values.push(cell),
        }
        Ok(())
    }

    async fn me(&self) -> Result<Account> {
        Ok(Account {
            id: Some("1".to_string()),
            name: "In-memory board".to_string(),
            email: None,
        })
    }

    async fn list_webhooks(&self, board_id: &str) -> Result<Vec<WebhookSubscription>> {
        Ok(self
            .lock()
            .webhooks
            .iter()
            .filter(|w| w.board_id == board_id)
            .cloned()
            .collect())
    }

    async fn create_webhook(
        &self,
        board_id: &str,
        event: &str,
        url: &str,
    ) -> Result<WebhookSubscription> {
        let mut state = self.lock();
        state.calls.push(BoardCall::CreateWebhook {
            board_id: board_id.to_string(),
            event: event.to_string(),
            url: url.to_string(),
        });
        let subscription = WebhookSubscription {
            id: self.next_id.fetch_add(1, Ordering::Relaxed).to_string(),
            board_id: board_id.to_string(),
            event: event.to_string(),
            url: Some(url.to_string()),
        };
        state.webhooks.push(subscription.clone());
        Ok(subscription)
    }
}

fn column_text(value: &ColumnInput) -> Option<String> {
    match value {
        ColumnInput::Text(s) => Some(s.clone()),
        ColumnInput::Empty => None,
    }
}
