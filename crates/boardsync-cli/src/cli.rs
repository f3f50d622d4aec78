// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Command-line arguments.

use boardsync_core::sync::{DEFAULT_BATCH_SIZE, FetchSource, Scope, SyncOptions};
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Default record limit of the test commands.
pub const TEST_LIMIT: usize = 10;

/// Synchronize board items with the local database
#[derive(Parser, Debug)]
#[command(name = "boardsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Bounds shared by every sync command.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    /// Process at most this many records
    #[arg(long, global = true, env = "BOARDSYNC_LIMIT")]
    pub limit: Option<usize>,

    /// Records per progress batch
    #[arg(long, global = true, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Stop fetching after this many pages
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_pages: Option<u32>,

    /// Replay the newest snapshot instead of calling the API
    #[arg(long, global = true)]
    pub use_cache: bool,

    /// Replay this snapshot file (implies --use-cache)
    #[arg(long, global = true)]
    pub cache_file: Option<String>,
}

impl RunArgs {
    /// Options for one run.
    pub fn options(&self) -> SyncOptions {
        let source = if self.use_cache || self.cache_file.is_some() {
            FetchSource::Snapshot {
                file: self.cache_file.clone(),
            }
        } else {
            FetchSource::Api
        };
        SyncOptions {
            limit: self.limit,
            batch_size: self.batch_size,
            max_pages: self.max_pages,
            source,
        }
    }

    /// Options for a test command: a default limit, and one page for projects.
    pub fn test_options(&self, single_page: bool) -> SyncOptions {
        let mut options = self.options();
        options.limit = Some(self.limit.unwrap_or(TEST_LIMIT));
        if single_page {
            options.max_pages = Some(self.max_pages.unwrap_or(1));
        }
        options
    }
}

/// Entity selection.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeArg {
    Users,
    Projects,
    All,
}

impl From<ScopeArg> for Scope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Users => Scope::Users,
            ScopeArg::Projects => Scope::Projects,
            ScopeArg::All => Scope::All,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Pull board items into the database
    Pull {
        #[arg(value_enum, default_value_t = ScopeArg::All)]
        scope: ScopeArg,
    },

    /// Push active database records to the boards
    Push {
        #[arg(value_enum, default_value_t = ScopeArg::All)]
        scope: ScopeArg,
    },

    /// Pull everything, then push everything
    Bidirectional,

    /// Pull a limited number of users (default 10)
    TestUsers,

    /// Pull a limited number of projects from the first page (default 10)
    TestProjects,

    /// List saved board snapshots, newest first
    ListCache {
        /// Only snapshots of this board
        #[arg(long)]
        board: Option<String>,
    },

    /// Check board API and database connectivity
    Check,

    /// Run a bidirectional sync now and then on an interval
    Scheduled {
        /// Minutes between runs
        #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
        interval_mins: u64,
    },
}
