// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! On-disk snapshots of fetched boards.
//!
//! Every API fetch can be saved as `board_{board_id}_{YYYYmmdd_HHMMSS}.json`
//! and replayed later instead of calling the API. Files written by the older
//! sync scripts (`monday_board_` prefix, naive `cached_at`) are read too.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::models::BoardItem;

const PREFIX: &str = "board_";
const LEGACY_PREFIX: &str = "monday_board_";
const EXTENSION: &str = ".json";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Header stored alongside the items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub board_id: String,
    /// `YYYYmmdd_HHMMSS`, also part of the filename.
    pub timestamp: String,
    /// `None` when the file could not be read.
    pub item_count: Option<usize>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub cached_at: Option<DateTime<Utc>>,
}

/// RFC 3339, or a naive ISO timestamp taken as UTC. Anything else is dropped.
fn lenient_datetime<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    Ok(NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc()))
}

/// A snapshot file and its header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    pub filename: String,
    #[serde(flatten)]
    pub metadata: SnapshotMetadata,
}

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    metadata: SnapshotMetadata,
    data: Vec<BoardItem>,
}

/// Snapshot directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a snapshot and return its filename.
    pub async fn save(&self, board_id: &str, items: &[BoardItem]) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let now = Utc::now();
        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
        let filename = format!("{PREFIX}{board_id}_{timestamp}{EXTENSION}");

        let file = SnapshotFile {
            metadata: SnapshotMetadata {
                board_id: board_id.to_string(),
                timestamp,
                item_count: Some(items.len()),
                cached_at: Some(now),
            },
            data: items.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        tokio::fs::write(self.dir.join(&filename), bytes).await?;

        info!(board_id, filename = %filename, items = items.len(), "Saved board snapshot");
        Ok(filename)
    }

    /// Read the items of a snapshot file.
    pub async fn load(&self, filename: &str) -> Result<Vec<BoardItem>> {
        if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
            return Err(SyncError::Snapshot(format!(
                "invalid snapshot filename '{}'",
                filename
            )));
        }

        let path = self.dir.join(filename);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::Snapshot(format!(
                    "snapshot '{}' not found in {}",
                    filename,
                    self.dir.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let file: SnapshotFile = serde_json::from_slice(&bytes).map_err(|e| {
            SyncError::Snapshot(format!("snapshot '{}' is not valid: {}", filename, e))
        })?;
        debug!(filename, items = file.data.len(), "Loaded board snapshot");
        Ok(file.data)
    }

    /// Newest snapshot of a board, if any.
    pub async fn load_latest(&self, board_id: &str) -> Result<Option<(String, Vec<BoardItem>)>> {
        let mut names = self.filenames(Some(board_id)).await?;
        // Newest by the filename timestamp, whichever prefix the file has
        names.sort_by_cached_key(|name| {
            std::cmp::Reverse(parse_filename(name).map(|(_, timestamp)| timestamp))
        });
        match names.into_iter().next() {
            Some(name) => {
                let items = self.load(&name).await?;
                Ok(Some((name, items)))
            }
            None => Ok(None),
        }
    }

    /// Snapshot headers, newest first.
    ///
    /// Files that cannot be parsed are listed with the board id and
    /// timestamp taken from the filename and no item count.
    pub async fn list(&self, board_id: Option<&str>) -> Result<Vec<SnapshotInfo>> {
        let mut result = Vec::new();
        for filename in self.filenames(board_id).await? {
            let parsed = match tokio::fs::read(self.dir.join(&filename)).await {
                Ok(bytes) => serde_json::from_slice::<SnapshotFile>(&bytes).ok(),
                Err(e) => {
                    warn!(filename = %filename, error = %e, "Failed to read snapshot");
                    None
                }
            };

            let metadata = match parsed {
                Some(file) => file.metadata,
                None => match parse_filename(&filename) {
                    Some((board_id, timestamp)) => SnapshotMetadata {
                        board_id,
                        timestamp,
                        item_count: None,
                        cached_at: None,
                    },
                    None => continue,
                },
            };
            result.push(SnapshotInfo { filename, metadata });
        }

        result.sort_by(|a, b| b.metadata.timestamp.cmp(&a.metadata.timestamp));
        Ok(result)
    }

    async fn filenames(&self, board_id: Option<&str>) -> Result<Vec<String>> {
        let prefixes: Vec<String> = [PREFIX, LEGACY_PREFIX]
            .iter()
            .map(|p| match board_id {
                Some(id) => format!("{p}{id}_"),
                None => p.to_string(),
            })
            .collect();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if prefixes.iter().any(|p| name.starts_with(p.as_str())) && name.ends_with(EXTENSION) {
                names.push(name);
            }
        }
        Ok(names)
    }
}

/// `board_{id}_{date}_{time}.json` → `(id, "{date}_{time}")`
fn parse_filename(filename: &str) -> Option<(String, String)> {
    let stem = filename
        .strip_prefix(PREFIX)
        .or_else(|| filename.strip_prefix(LEGACY_PREFIX))?
        .strip_suffix(EXTENSION)?;
    let mut parts = stem.rsplitn(3, '_');
    let time = parts.next()?;
    let date = parts.next()?;
    let board_id = parts.next()?;
    Some((board_id.to_string(), format!("{date}_{time}")))
}
