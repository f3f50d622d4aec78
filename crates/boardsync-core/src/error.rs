// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for boardsync-core.

use thiserror::Error;

/// Sync errors.
///
/// The variants follow the failure classes of a sync run: transient
/// network problems, unexpected board payloads, and persistence failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Network failure or exhausted rate-limit retries.
    #[error("Transient error: {0}")]
    Transient(String),

    /// The board API answered with something we could not use.
    #[error("Payload error: {0}")]
    Payload(String),

    /// Database operation failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Snapshot file could not be read or written.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A local record referenced by a correlation entry does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Table or entity name.
        entity: &'static str,
        /// The missing identifier.
        id: String,
    },
}

impl SyncError {
    /// Whether retrying the whole operation later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Payload(format!("undecodable response: {}", e))
        } else if e.is_timeout() {
            Self::Transient(format!("request timed out: {}", e))
        } else if e.is_connect() {
            Self::Transient(format!("connection failed: {}", e))
        } else {
            Self::Transient(e.to_string())
        }
    }
}

/// Result type using SyncError.
pub type Result<T> = std::result::Result<T, SyncError>;
