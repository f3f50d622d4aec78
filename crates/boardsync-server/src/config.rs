// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use boardsync_core::config::ConfigError;

/// HTTP server settings loaded from environment variables.
#[derive(Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub bind_addr: SocketAddr,
    /// Shared secret expected in the webhook `Authorization` header.
    pub webhook_secret: Option<String>,
    /// Public base URL that the board service delivers webhooks to.
    pub public_url: Option<String>,
    /// Interval of the background bidirectional sync.
    pub sync_interval: Option<Duration>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// - `BOARDSYNC_PORT`: listen port (default: 5000)
    /// - `BOARDSYNC_WEBHOOK_SECRET`: webhook shared secret (default: no check)
    /// - `BOARDSYNC_PUBLIC_URL`: base URL for webhook subscriptions
    /// - `BOARDSYNC_SYNC_INTERVAL_MINS`: scheduler interval, 0 or unset disables it
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = std::env::var("BOARDSYNC_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("BOARDSYNC_PORT", "must be a port number"))?;

        let interval_mins: u64 = match std::env::var("BOARDSYNC_SYNC_INTERVAL_MINS") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(
                    "BOARDSYNC_SYNC_INTERVAL_MINS",
                    "must be a non-negative integer",
                )
            })?,
            Err(_) => 0,
        };

        Ok(Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            webhook_secret: non_empty("BOARDSYNC_WEBHOOK_SECRET"),
            public_url: non_empty("BOARDSYNC_PUBLIC_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            sync_interval: (interval_mins > 0).then(|| Duration::from_secs(interval_mins * 60)),
        })
    }

    /// URL the board service should deliver webhooks to.
    pub fn webhook_url(&self) -> Option<String> {
        self.public_url.as_ref().map(|base| format!("{}/webhook", base))
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("public_url", &self.public_url)
            .field("sync_interval", &self.sync_interval)
            .finish()
    }
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "BOARDSYNC_PORT",
        "BOARDSYNC_WEBHOOK_SECRET",
        "BOARDSYNC_PUBLIC_URL",
        "BOARDSYNC_SYNC_INTERVAL_MINS",
    ];

    fn clear() {
        for var in VARS {
            // SAFETY: tests holding ENV_MUTEX are the only env writers
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    fn test_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear();

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_addr.port(), 5000);
        assert!(config.webhook_secret.is_none());
        assert!(config.webhook_url().is_none());
        assert!(config.sync_interval.is_none());
    }

    #[test]
    fn test_custom_values() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear();
        // SAFETY: serialized via ENV_MUTEX
        unsafe {
            env::set_var("BOARDSYNC_PORT", "8080");
            env::set_var("BOARDSYNC_WEBHOOK_SECRET", "s3cret");
            env::set_var("BOARDSYNC_PUBLIC_URL", "https://sync.example.com/");
            env::set_var("BOARDSYNC_SYNC_INTERVAL_MINS", "15");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.webhook_secret.as_deref(), Some("s3cret"));
        assert_eq!(
            config.webhook_url().as_deref(),
            Some("https://sync.example.com/webhook")
        );
        assert_eq!(config.sync_interval, Some(Duration::from_secs(900)));
        assert!(!format!("{:?}", config).contains("s3cret"));
        clear();
    }

    #[test]
    fn test_invalid_port() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear();
        // SAFETY: serialized via ENV_MUTEX
        unsafe { env::set_var("BOARDSYNC_PORT", "not-a-port") };

        assert!(matches!(
            ServerConfig::from_env(),
            Err(ConfigError::Invalid("BOARDSYNC_PORT", _))
        ));
        clear();
    }
}
