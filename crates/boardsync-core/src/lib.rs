// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! boardsync core - board ↔ database synchronization
//!
//! This crate keeps two monday.com boards (sales staff and master projects)
//! and a relational database in step. The only durable cross-system state is
//! a correlation table linking external item ids to local record ids, plus an
//! audit log of every attempt.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────┐
//! │  boardsync-server    │        │    boardsync-cli     │
//! │ webhook, /sync, cron │        │  one-shot commands   │
//! └──────────┬───────────┘        └──────────┬───────────┘
//!            └──────────────┬────────────────┘
//!                           ▼
//!                 ┌───────────────────┐
//!                 │    SyncEngine     │──── ColumnMap (mapping)
//!                 └───┬───────────┬───┘
//!                     │           │
//!          BoardApi   ▼           ▼   Store
//!     ┌──────────────────┐   ┌──────────────────────────┐
//!     │ MondayClient     │   │ PostgresStore/SqliteStore│
//!     │ (GraphQL, 429    │   │ sync_mapping, sync_logs, │
//!     │  back-off)       │   │ users, projects, ...     │
//!     └──────────────────┘   └──────────────────────────┘
//! ```
//!
//! # Sync Semantics
//!
//! | Direction | Create signal | Update rule |
//! |-----------|---------------|-------------|
//! | Pull (board → store) | no correlation and no natural-key match | coalesce: blanks never overwrite |
//! | Push (store → board) | no correlation | one `change_column_value` per mapped column |
//!
//! A board-side delete deactivates the local record (`is_active = false`)
//! and marks its correlation `deleted`. Nothing is removed.
//!
//! # Configuration
//!
//! See [`config::Config::from_env`]. The two required variables are
//! `BOARDSYNC_API_KEY` and `BOARDSYNC_DATABASE_URL`.
//!
//! # Modules
//!
//! - [`board`]: board API trait, GraphQL client and in-memory fake
//! - [`config`]: configuration from environment variables
//! - [`error`]: error taxonomy
//! - [`mapping`]: column ↔ field maps and address helpers
//! - [`models`]: shared data model
//! - [`snapshot`]: on-disk board snapshots for offline replay
//! - [`store`]: relational persistence
//! - [`sync`]: the sync engine

/// Board service access.
pub mod board;

/// Configuration loaded from environment variables.
pub mod config;

/// Error types.
pub mod error;

/// Column ↔ field mapping.
pub mod mapping;

/// Data model.
pub mod models;

/// Board snapshots.
pub mod snapshot;

/// PostgreSQL and SQLite persistence.
pub mod store;

/// Pull, push and delete handling.
pub mod sync;

pub use board::{BoardApi, InMemoryBoard, MondayClient};
pub use config::{BoardIds, Config};
pub use error::{Result, SyncError};
pub use models::EntityType;
pub use snapshot::SnapshotStore;
pub use store::Store;
pub use sync::{Direction, FetchSource, Scope, SyncEngine, SyncOptions, SyncReport};
