// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Interval scheduler for bidirectional syncs.
//!
//! Runs one bidirectional pass immediately, then one every `interval`.
//! Passes never overlap: the loop is sequential and shares the server's
//! sync lock with webhook-triggered pulls.

use std::sync::Arc;
use std::time::Duration;

use boardsync_core::SyncEngine;
use boardsync_core::sync::{Direction, Scope, SyncOptions};
use tokio::sync::{Mutex, Notify};
use tracing::{error, info};

/// Background task running periodic syncs.
pub struct SyncScheduler {
    engine: SyncEngine,
    interval: Duration,
    options: SyncOptions,
    sync_lock: Arc<Mutex<()>>,
    shutdown: Arc<Notify>,
}

impl SyncScheduler {
    pub fn new(engine: SyncEngine, interval: Duration, sync_lock: Arc<Mutex<()>>) -> Self {
        Self {
            engine,
            interval,
            options: SyncOptions::default(),
            sync_lock,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Override the per-run options.
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Get a handle to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the scheduler loop until shutdown is signalled.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "Sync scheduler started");

        loop {
            self.run_once().await;

            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("Sync scheduler shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// One bidirectional pass over both entity types.
    pub async fn run_once(&self) {
        let _guard = self.sync_lock.lock().await;
        info!("Starting scheduled bidirectional sync");
        match self
            .engine
            .run(Direction::Both, Scope::All, &self.options)
            .await
        {
            Ok(reports) => {
                for report in &reports {
                    info!(report = %report, "Scheduled sync pass finished");
                }
            }
            Err(e) => error!(error = %e, "Scheduled sync failed"),
        }
    }
}
