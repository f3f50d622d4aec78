// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! boardsync - command-line board ↔ database synchronization

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use boardsync_core::board::{BoardApi, MondayClient};
use boardsync_core::config::Config;
use boardsync_core::snapshot::SnapshotStore;
use boardsync_core::sync::{Direction, Scope, SyncEngine, SyncOptions, SyncReport};
use boardsync_core::{EntityType, Store};
use clap::Parser;
use tracing::{error, info, warn};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("BOARDSYNC_LOG")
                .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| "boardsync=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        Command::ListCache { board } => list_cache(board.as_deref()).await,
        Command::Check => check().await,
        Command::Pull { scope } => {
            let engine = connect().await?;
            run(&engine, Direction::BoardToStore, scope.into(), &cli.run.options()).await
        }
        Command::Push { scope } => {
            let engine = connect().await?;
            run(&engine, Direction::StoreToBoard, scope.into(), &cli.run.options()).await
        }
        Command::Bidirectional => {
            let engine = connect().await?;
            run(&engine, Direction::Both, Scope::All, &cli.run.options()).await
        }
        Command::TestUsers => {
            let engine = connect().await?;
            let report = engine
                .pull(EntityType::User, &cli.run.test_options(false))
                .await?;
            print_reports(&[report]);
            Ok(())
        }
        Command::TestProjects => {
            let engine = connect().await?;
            let report = engine
                .pull(EntityType::Project, &cli.run.test_options(true))
                .await?;
            print_reports(&[report]);
            Ok(())
        }
        Command::Scheduled { interval_mins } => {
            let engine = connect().await?;
            scheduled(
                &engine,
                Duration::from_secs(interval_mins * 60),
                &cli.run.options(),
            )
            .await
        }
    }
}

/// Build the engine from the environment.
async fn connect() -> anyhow::Result<SyncEngine> {
    let config = Config::from_env()?;
    let store = boardsync_core::store::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let client = MondayClient::new(config.api.clone())?;

    Ok(
        SyncEngine::new(Arc::new(client), store, config.boards.clone()).with_snapshots(
            SnapshotStore::new(&config.snapshot_dir),
            config.snapshots_enabled,
        ),
    )
}

async fn run(
    engine: &SyncEngine,
    direction: Direction,
    scope: Scope,
    options: &SyncOptions,
) -> anyhow::Result<()> {
    info!(direction = %direction, scope = ?scope, "Starting sync");
    let reports = engine.run(direction, scope, options).await?;
    print_reports(&reports);
    Ok(())
}

fn print_reports(reports: &[SyncReport]) {
    for report in reports {
        println!("{}", report);
    }
    let failed: usize = reports.iter().map(|r| r.failed).sum();
    if failed > 0 {
        println!("{} record(s) failed; see sync_logs for details", failed);
    }
}

async fn list_cache(board: Option<&str>) -> anyhow::Result<()> {
    let snapshots = SnapshotStore::new(Config::snapshot_dir_from_env());
    let list = snapshots.list(board).await?;
    if list.is_empty() {
        println!("No snapshots in {}", snapshots.dir().display());
        return Ok(());
    }

    println!("{:<44} {:<12} {:<17} {:>6}", "FILE", "BOARD", "TIMESTAMP", "ITEMS");
    for info in list {
        let items = info
            .metadata
            .item_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "{:<44} {:<12} {:<17} {:>6}",
            info.filename, info.metadata.board_id, info.metadata.timestamp, items
        );
    }
    Ok(())
}

async fn check() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let mut healthy = true;

    let client = MondayClient::new(config.api.clone())?;
    match client.me().await {
        Ok(account) => println!(
            "Board API: connected as {} ({})",
            account.name,
            account.email.as_deref().unwrap_or("no email")
        ),
        Err(e) => {
            healthy = false;
            println!("Board API: FAILED ({})", e);
        }
    }

    match boardsync_core::store::connect(&config.database_url).await {
        Ok(store) => match store.ping().await {
            Ok(()) => println!("Database: connected"),
            Err(e) => {
                healthy = false;
                println!("Database: FAILED ({})", e);
            }
        },
        Err(e) => {
            healthy = false;
            println!("Database: FAILED ({})", e);
        }
    }

    if !healthy {
        anyhow::bail!("connectivity check failed");
    }
    Ok(())
}

async fn scheduled(
    engine: &SyncEngine,
    interval: Duration,
    options: &SyncOptions,
) -> anyhow::Result<()> {
    info!(interval_secs = interval.as_secs(), "Scheduled sync started");

    loop {
        match engine.run(Direction::Both, Scope::All, options).await {
            Ok(reports) => print_reports(&reports),
            Err(e) => error!(error = %e, "Scheduled sync failed"),
        }

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Shutdown signal received");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
    Ok(())
}
