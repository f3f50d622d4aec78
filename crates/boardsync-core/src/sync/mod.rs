// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sync engine.
//!
//! Moves records between the board service and the relational store. Pull
//! (board → store) upserts local records through the correlation table; push
//! (store → board) creates or updates board items for active local records.
//! Every attempt is audited. Per-record failures are audited and skipped;
//! store failures outside a record abort the run.

mod pull;
mod push;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tracing::{info, warn};

use crate::board::BoardApi;
use crate::config::BoardIds;
use crate::error::Result;
use crate::mapping::ColumnMap;
use crate::models::{BoardItem, EntityType, NewAuditEntry, SyncOperation};
use crate::snapshot::SnapshotStore;
use crate::store::Store;

/// Default number of records per progress batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Which way records flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Pull: board → store.
    BoardToStore,
    /// Push: store → board.
    StoreToBoard,
    /// Pull, then push.
    Both,
}

impl Direction {
    fn pulls(&self) -> bool {
        matches!(self, Self::BoardToStore | Self::Both)
    }

    fn pushes(&self) -> bool {
        matches!(self, Self::StoreToBoard | Self::Both)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BoardToStore => "board-to-store",
            Self::StoreToBoard => "store-to-board",
            Self::Both => "both",
        })
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            // monday-to-pg / pg-to-monday are the names older callers use
            "board-to-store" | "board_to_store" | "pull" | "monday-to-pg" => {
                Ok(Self::BoardToStore)
            }
            "store-to-board" | "store_to_board" | "push" | "pg-to-monday" => {
                Ok(Self::StoreToBoard)
            }
            "both" | "bidirectional" => Ok(Self::Both),
            other => Err(format!("unknown sync direction '{}'", other)),
        }
    }
}

/// Which entity types a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Users,
    Projects,
    All,
}

impl Scope {
    /// Entity types in sync order.
    pub fn entities(&self) -> Vec<EntityType> {
        match self {
            Self::Users => vec![EntityType::User],
            Self::Projects => vec![EntityType::Project],
            Self::All => EntityType::ALL.to_vec(),
        }
    }
}

impl From<EntityType> for Scope {
    fn from(entity: EntityType) -> Self {
        match entity {
            EntityType::User => Self::Users,
            EntityType::Project => Self::Projects,
        }
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            other => other.parse::<EntityType>().map(Self::from),
        }
    }
}

/// Where pull reads board items from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FetchSource {
    /// Live API fetch.
    #[default]
    Api,
    /// Replay a snapshot: the named file, or the newest one for the board.
    /// Falls back to the API when no snapshot exists.
    Snapshot { file: Option<String> },
}

/// Bounds for one run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Process at most this many records.
    pub limit: Option<usize>,
    /// Records per progress batch.
    pub batch_size: usize,
    /// Stop fetching after this many pages.
    pub max_pages: Option<u32>,
    /// Item source for pulls.
    pub source: FetchSource,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            limit: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_pages: None,
            source: FetchSource::Api,
        }
    }
}

impl SyncOptions {
    /// Options for a limited test run.
    pub fn limited(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

/// Counters for one entity type and direction.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub entity_type: EntityType,
    pub direction: Direction,
    /// Records read from the source side.
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl SyncReport {
    fn new(entity_type: EntityType, direction: Direction) -> Self {
        Self {
            entity_type,
            direction,
            fetched: 0,
            created: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            elapsed: Duration::ZERO,
        }
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {} fetched, {} created, {} updated, {} skipped, {} failed in {:.2}s",
            self.entity_type,
            self.direction,
            self.fetched,
            self.created,
            self.updated,
            self.skipped,
            self.failed,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Result of processing one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Created,
    Updated,
    Skipped,
}

/// Result of pulling one item.
#[derive(Debug, Clone)]
pub enum ItemPullOutcome {
    /// The board is not one of the synchronized boards.
    UnknownBoard,
    /// The board service has no such item.
    NotFound,
    /// The item was processed; the report counts it.
    Pulled(SyncReport),
}

/// Result of a board-side deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The board is not one of the synchronized boards.
    UnknownBoard,
    /// No correlation exists for the item.
    NotCorrelated,
    /// The local record was deactivated and the correlation marked deleted.
    Deactivated {
        entity_type: EntityType,
        local_id: String,
    },
}

/// Sync engine over a board service and a store.
#[derive(Clone)]
pub struct SyncEngine {
    board: Arc<dyn BoardApi>,
    store: Arc<dyn Store>,
    boards: BoardIds,
    users_map: ColumnMap,
    projects_map: ColumnMap,
    snapshots: Option<SnapshotStore>,
    save_snapshots: bool,
}

impl SyncEngine {
    pub fn new(board: Arc<dyn BoardApi>, store: Arc<dyn Store>, boards: BoardIds) -> Self {
        Self {
            board,
            store,
            boards,
            users_map: ColumnMap::users(),
            projects_map: ColumnMap::projects(),
            snapshots: None,
            save_snapshots: false,
        }
    }

    /// Enable snapshot replay, and saving after every API fetch when `save` is set.
    pub fn with_snapshots(mut self, snapshots: SnapshotStore, save: bool) -> Self {
        self.snapshots = Some(snapshots);
        self.save_snapshots = save;
        self
    }

    pub fn board(&self) -> &Arc<dyn BoardApi> {
        &self.board
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn boards(&self) -> &BoardIds {
        &self.boards
    }

    pub fn snapshots(&self) -> Option<&SnapshotStore> {
        self.snapshots.as_ref()
    }

    /// Entity type synchronized from a board, if any.
    pub fn entity_for_board(&self, board_id: &str) -> Option<EntityType> {
        if board_id == self.boards.users {
            Some(EntityType::User)
        } else if board_id == self.boards.projects {
            Some(EntityType::Project)
        } else {
            None
        }
    }

    /// Board holding an entity type.
    pub fn board_for(&self, entity: EntityType) -> &str {
        match entity {
            EntityType::User => &self.boards.users,
            EntityType::Project => &self.boards.projects,
        }
    }

    /// Column map of an entity type.
    pub fn column_map(&self, entity: EntityType) -> &ColumnMap {
        match entity {
            EntityType::User => &self.users_map,
            EntityType::Project => &self.projects_map,
        }
    }

    /// Fetch the items of an entity type's board from the configured source.
    pub async fn fetch(&self, entity: EntityType, opts: &SyncOptions) -> Result<Vec<BoardItem>> {
        let board_id = self.board_for(entity);

        if let FetchSource::Snapshot { file } = &opts.source {
            if let Some(mut items) = self.replay(board_id, file.as_deref()).await? {
                if let Some(limit) = opts.limit {
                    items.truncate(limit);
                }
                return Ok(items);
            }
            warn!(board_id, "No snapshot available, fetching from API");
        }

        let column_ids = self.column_map(entity).column_ids();
        let mut items = self
            .board
            .fetch_items(board_id, &column_ids, opts.max_pages)
            .await?;

        if self.save_snapshots
            && let Some(snapshots) = &self.snapshots
            && let Err(e) = snapshots.save(board_id, &items).await
        {
            warn!(board_id, error = %e, "Failed to save board snapshot");
        }

        if let Some(limit) = opts.limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    async fn replay(&self, board_id: &str, file: Option<&str>) -> Result<Option<Vec<BoardItem>>> {
        let Some(snapshots) = &self.snapshots else {
            return Ok(None);
        };
        match file {
            Some(name) => {
                info!(board_id, filename = name, "Replaying snapshot");
                Ok(Some(snapshots.load(name).await?))
            }
            None => match snapshots.load_latest(board_id).await? {
                Some((name, items)) => {
                    info!(board_id, filename = %name, "Replaying latest snapshot");
                    Ok(Some(items))
                }
                None => Ok(None),
            },
        }
    }

    /// Run the requested passes. All pulls run before any push.
    pub async fn run(
        &self,
        direction: Direction,
        scope: Scope,
        opts: &SyncOptions,
    ) -> Result<Vec<SyncReport>> {
        let mut reports = Vec::new();
        if direction.pulls() {
            for entity in scope.entities() {
                reports.push(self.pull(entity, opts).await?);
            }
        }
        if direction.pushes() {
            for entity in scope.entities() {
                reports.push(self.push(entity, opts).await?);
            }
        }
        Ok(reports)
    }

    /// Soft-delete the local record correlated with a deleted board item.
    ///
    /// The local record gets `is_active = false` and the correlation
    /// `sync_status = 'deleted'`. No rows are removed.
    pub async fn handle_delete(&self, board_id: &str, item_id: &str) -> Result<DeleteOutcome> {
        let Some(entity) = self.entity_for_board(board_id) else {
            return Ok(DeleteOutcome::UnknownBoard);
        };
        let Some(local_id) = self.store.get_local_id(entity, item_id).await? else {
            info!(entity = %entity, item_id, "Deleted item was never synchronized");
            return Ok(DeleteOutcome::NotCorrelated);
        };

        let deactivated = match entity {
            EntityType::User => self.store.set_user_active(&local_id, false).await?,
            EntityType::Project => self.store.set_project_active(&local_id, false).await?,
        };
        if !deactivated {
            warn!(entity = %entity, local_id = %local_id, "Correlated local record is missing");
        }
        self.store.mark_correlation_deleted(entity, item_id).await?;
        self.store
            .record_audit(&NewAuditEntry::success(entity, item_id, SyncOperation::Delete))
            .await?;

        info!(entity = %entity, item_id, local_id = %local_id, "Deactivated deleted item");
        Ok(DeleteOutcome::Deactivated {
            entity_type: entity,
            local_id,
        })
    }
}

pub(crate) fn log_batch(
    entity: EntityType,
    direction: Direction,
    index: usize,
    total: usize,
    size: usize,
) {
    info!(
        entity = %entity,
        direction = %direction,
        batch = index + 1,
        batches = total,
        size,
        "Processing batch"
    );
}

pub(crate) fn finish(mut report: SyncReport, started: Instant) -> SyncReport {
    report.elapsed = started.elapsed();
    info!(
        entity = %report.entity_type,
        direction = %report.direction,
        fetched = report.fetched,
        created = report.created,
        updated = report.updated,
        skipped = report.skipped,
        failed = report.failed,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Sync pass completed"
    );
    report
}
