// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! boardsync server
//!
//! HTTP surface over [`boardsync_core::SyncEngine`]:
//!
//! - `POST /webhook`: board events. Creates and updates pull the owning
//!   board; deletions soft-delete the correlated local record.
//! - `POST /sync`: manual run with a direction and entity scope.
//! - `GET /health`: liveness and database ping.
//!
//! On startup the binary registers webhook subscriptions at
//! `{BOARDSYNC_PUBLIC_URL}/webhook` and, when `BOARDSYNC_SYNC_INTERVAL_MINS`
//! is set, runs a bidirectional sync on that interval.

pub mod config;
pub mod error;
pub mod scheduler;
pub mod server;
pub mod subscriptions;
pub mod webhook;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{AppState, router, serve};
