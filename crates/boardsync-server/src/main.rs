// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! boardsync server - webhook receiver and scheduled sync

use std::sync::Arc;

use boardsync_core::board::MondayClient;
use boardsync_core::config::Config;
use boardsync_core::snapshot::SnapshotStore;
use boardsync_core::sync::SyncEngine;
use boardsync_server::config::ServerConfig;
use boardsync_server::scheduler::SyncScheduler;
use boardsync_server::server::{self, AppState};
use boardsync_server::subscriptions;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("BOARDSYNC_LOG")
                .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| "boardsync=info,tower_http=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;
    let server_config = ServerConfig::from_env()?;

    info!(
        bind_addr = %server_config.bind_addr,
        users_board = %config.boards.users,
        projects_board = %config.boards.projects,
        scheduler = server_config.sync_interval.is_some(),
        "Starting boardsync server"
    );

    let store = boardsync_core::store::connect(&config.database_url).await?;
    store.ping().await?;
    info!("Connected to database");

    let client = Arc::new(MondayClient::new(config.api.clone())?);
    let engine = SyncEngine::new(client.clone(), store, config.boards.clone()).with_snapshots(
        SnapshotStore::new(&config.snapshot_dir),
        config.snapshots_enabled,
    );

    if let Some(url) = server_config.webhook_url() {
        match subscriptions::ensure_webhooks(client.as_ref(), &config.boards, &url).await {
            Ok(created) => info!(created, url = %url, "Webhook subscriptions verified"),
            Err(e) => warn!(error = %e, "Failed to verify webhook subscriptions"),
        }
    }

    let state = Arc::new(AppState::new(engine.clone(), server_config.webhook_secret.clone()));

    // Start the scheduler
    let scheduler = server_config.sync_interval.map(|interval| {
        let scheduler = SyncScheduler::new(engine, interval, state.sync_lock.clone());
        let shutdown = scheduler.shutdown_handle();
        (shutdown, tokio::spawn(scheduler.run()))
    });

    let listener = tokio::net::TcpListener::bind(server_config.bind_addr).await?;
    server::serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Shutdown signal received");
    })
    .await?;

    if let Some((shutdown, handle)) = scheduler {
        shutdown.notify_one();
        if let Err(e) = handle.await {
            warn!(error = %e, "Scheduler task failed");
        }
    }

    info!("boardsync server shut down");
    Ok(())
}
