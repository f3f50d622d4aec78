// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default board API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.monday.com/v2";

/// Default snapshot directory.
pub const DEFAULT_SNAPSHOT_DIR: &str = ".data/snapshots";

/// Board API client settings.
#[derive(Clone)]
pub struct BoardApiConfig {
    /// Static API token sent in the `Authorization` header.
    pub api_key: String,
    /// GraphQL endpoint URL.
    pub api_url: String,
    /// Fixed pause before every request (static throttle).
    pub request_delay: Duration,
    /// Pause after an HTTP 429 before retrying the same request.
    pub rate_limit_backoff: Duration,
    /// Consecutive 429 responses tolerated before giving up.
    pub max_rate_limit_retries: u32,
}

impl BoardApiConfig {
    /// Settings with the given token and default endpoint and timings.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            request_delay: Duration::from_millis(200),
            rate_limit_backoff: Duration::from_secs(60),
            max_rate_limit_retries: 5,
        }
    }
}

impl fmt::Debug for BoardApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardApiConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("request_delay", &self.request_delay)
            .field("rate_limit_backoff", &self.rate_limit_backoff)
            .field("max_rate_limit_retries", &self.max_rate_limit_retries)
            .finish()
    }
}

/// Identifiers of the two synchronized boards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardIds {
    /// Sales staff board (users).
    pub users: String,
    /// Master project board (projects).
    pub projects: String,
}

impl Default for BoardIds {
    fn default() -> Self {
        Self {
            users: "5764059860".to_string(),
            projects: "6727219152".to_string(),
        }
    }
}

/// boardsync configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Board API client settings.
    pub api: BoardApiConfig,
    /// Board identifiers.
    pub boards: BoardIds,
    /// PostgreSQL or SQLite connection URL.
    pub database_url: String,
    /// Directory for fetched-board snapshots.
    pub snapshot_dir: PathBuf,
    /// Whether every API fetch is written to a snapshot.
    pub snapshots_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `BOARDSYNC_API_KEY`: board API token
    /// - `BOARDSYNC_DATABASE_URL` (or `DATABASE_URL`): PostgreSQL or SQLite connection string
    ///
    /// Optional (with defaults):
    /// - `BOARDSYNC_API_URL`: GraphQL endpoint (default: monday v2)
    /// - `BOARDSYNC_USERS_BOARD_ID` / `BOARDSYNC_PROJECTS_BOARD_ID`
    /// - `BOARDSYNC_REQUEST_DELAY_MS`: throttle between requests (default: 200)
    /// - `BOARDSYNC_RATE_LIMIT_BACKOFF_SECS`: pause after HTTP 429 (default: 60)
    /// - `BOARDSYNC_RATE_LIMIT_RETRIES`: 429 retries per request (default: 5)
    /// - `BOARDSYNC_SNAPSHOT_DIR`: snapshot directory (default: .data/snapshots)
    /// - `BOARDSYNC_SNAPSHOTS_ENABLED`: save snapshots after fetches (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("BOARDSYNC_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("BOARDSYNC_API_KEY"))?;

        let database_url = std::env::var("BOARDSYNC_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| ConfigError::Missing("BOARDSYNC_DATABASE_URL or DATABASE_URL"))?;

        let api_url =
            std::env::var("BOARDSYNC_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let request_delay_ms: u64 = parse_var(
            "BOARDSYNC_REQUEST_DELAY_MS",
            200,
            "must be a non-negative integer",
        )?;
        let backoff_secs: u64 = parse_var(
            "BOARDSYNC_RATE_LIMIT_BACKOFF_SECS",
            60,
            "must be a non-negative integer",
        )?;
        let max_rate_limit_retries: u32 = parse_var(
            "BOARDSYNC_RATE_LIMIT_RETRIES",
            5,
            "must be a non-negative integer",
        )?;

        let defaults = BoardIds::default();
        let boards = BoardIds {
            users: std::env::var("BOARDSYNC_USERS_BOARD_ID").unwrap_or(defaults.users),
            projects: std::env::var("BOARDSYNC_PROJECTS_BOARD_ID").unwrap_or(defaults.projects),
        };
        if boards.users == boards.projects {
            return Err(ConfigError::Invalid(
                "BOARDSYNC_PROJECTS_BOARD_ID",
                "must differ from BOARDSYNC_USERS_BOARD_ID",
            ));
        }

        let snapshot_dir = Self::snapshot_dir_from_env();

        let snapshots_enabled = std::env::var("BOARDSYNC_SNAPSHOTS_ENABLED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        Ok(Self {
            api: BoardApiConfig {
                api_key,
                api_url,
                request_delay: Duration::from_millis(request_delay_ms),
                rate_limit_backoff: Duration::from_secs(backoff_secs),
                max_rate_limit_retries,
            },
            boards,
            database_url,
            snapshot_dir,
            snapshots_enabled,
        })
    }

    /// `BOARDSYNC_SNAPSHOT_DIR`, readable without the rest of the configuration.
    pub fn snapshot_dir_from_env() -> PathBuf {
        PathBuf::from(
            std::env::var("BOARDSYNC_SNAPSHOT_DIR")
                .unwrap_or_else(|_| DEFAULT_SNAPSHOT_DIR.to_string()),
        )
    }
}

fn parse_var<T: FromStr>(
    key: &'static str,
    default: T,
    expectation: &'static str,
) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, expectation)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
