// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared fixtures for boardsync-core integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use boardsync_core::board::InMemoryBoard;
use boardsync_core::config::BoardIds;
use boardsync_core::models::{BoardItem, ColumnValue};
use boardsync_core::store::{SqliteStore, Store};
use boardsync_core::sync::SyncEngine;

pub const USERS_BOARD: &str = "5764059860";
pub const PROJECTS_BOARD: &str = "6727219152";

/// In-memory board, in-memory SQLite store and an engine over both.
pub struct TestContext {
    pub board: Arc<InMemoryBoard>,
    pub store: Arc<SqliteStore>,
    pub engine: SyncEngine,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_board(InMemoryBoard::new()).await
    }

    pub async fn with_board(board: InMemoryBoard) -> Self {
        let board = Arc::new(board);
        board.set_items(USERS_BOARD, Vec::new());
        board.set_items(PROJECTS_BOARD, Vec::new());

        let store = Arc::new(
            SqliteStore::connect("sqlite::memory:")
                .await
                .expect("Failed to open in-memory store"),
        );
        let engine = SyncEngine::new(
            board.clone(),
            store.clone() as Arc<dyn Store>,
            BoardIds::default(),
        );

        Self {
            board,
            store,
            engine,
        }
    }
}

/// Board item with text-only columns.
pub fn item(id: &str, name: &str, columns: &[(&str, &str)]) -> BoardItem {
    BoardItem::new(
        id,
        name,
        columns
            .iter()
            .map(|(column, text)| ColumnValue::text(*column, *text))
            .collect(),
    )
}

/// Sales staff item.
pub fn user_item(id: &str, first: &str, last: &str, email: &str) -> BoardItem {
    item(
        id,
        &format!("{} {}", first, last),
        &[("text25", first), ("text1", last), ("email7", email)],
    )
}

/// Master project item.
pub fn project_item(id: &str, name: &str, customer: &str, email: &str) -> BoardItem {
    item(
        id,
        name,
        &[
            ("text95__1", "In Progress"),
            ("text65__1", customer),
            ("email4__1", email),
            ("dup__of_job_address0__1", "12 Main St, Springfield, IL 62704"),
            ("numbers0", "$12,500.00"),
            ("text43__1", "Gate code 1234"),
        ],
    )
}
