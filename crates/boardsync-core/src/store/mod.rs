// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Relational store: local records, the correlation table and the audit log.
//!
//! [`Store`] is implemented for PostgreSQL ([`PostgresStore`]) and SQLite
//! ([`SqliteStore`]). Use [`connect`] to pick one from a connection URL.
//!
//! Updates follow a coalesce rule: `None` or empty incoming values never
//! overwrite what is stored, and JSON objects are merged key by key.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresStore;
pub use self::sqlite::SqliteStore;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::types::Json;

use crate::config::ConfigError;
use crate::error::{Result, SyncError};
use crate::models::{
    AuditEntry, CorrelationEntry, CustomerFields, CustomerRecord, EntityType, NewAuditEntry,
    NoteFields, ProjectExport, ProjectFields, ProjectRecord, PropertyFields, PropertyRecord,
    UserExport, UserFields, UserRecord,
};

/// Persistence operations used by the sync engine.
#[async_trait]
pub trait Store: Send + Sync {
    /// Round-trip a trivial query.
    async fn ping(&self) -> Result<()>;

    // ========================================================================
    // Correlation
    // ========================================================================

    /// Local id correlated with an external item.
    async fn get_local_id(&self, entity: EntityType, external_id: &str) -> Result<Option<String>>;

    /// External id correlated with a local record.
    async fn get_external_id(&self, entity: EntityType, local_id: &str) -> Result<Option<String>>;

    /// Full correlation row for an external item.
    async fn get_correlation(
        &self,
        entity: EntityType,
        external_id: &str,
    ) -> Result<Option<CorrelationEntry>>;

    /// Correlate a local record with an external item.
    ///
    /// Re-adding for an existing `(entity, local_id)` replaces the external
    /// id and resets the status to `success`.
    async fn add_correlation(&self, entity: EntityType, local_id: &str, external_id: &str)
    -> Result<()>;

    /// Set `sync_status = 'deleted'`. Returns false when no row matched.
    async fn mark_correlation_deleted(&self, entity: EntityType, external_id: &str) -> Result<bool>;

    /// Number of correlation rows of an entity type.
    async fn count_correlations(&self, entity: EntityType) -> Result<i64>;

    // ========================================================================
    // Audit
    // ========================================================================

    /// Append one audit row.
    async fn record_audit(&self, entry: &NewAuditEntry) -> Result<()>;

    /// Most recent audit rows, newest first.
    async fn list_audit(&self, entity: Option<EntityType>, limit: i64) -> Result<Vec<AuditEntry>>;

    // ========================================================================
    // Teams and users
    // ========================================================================

    /// Id of the team with this name, creating it if needed.
    async fn ensure_team(&self, name: &str) -> Result<String>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>>;

    /// Insert a user and return its new id.
    async fn create_user(&self, fields: &UserFields) -> Result<String>;

    /// Coalesce-update a user. Fails with `NotFound` when the row is gone.
    async fn update_user(&self, id: &str, fields: &UserFields) -> Result<()>;

    /// Set `is_active`. Returns false when no row matched.
    async fn set_user_active(&self, id: &str, active: bool) -> Result<bool>;

    /// Active users joined with their team name.
    async fn list_active_users(&self) -> Result<Vec<UserExport>>;

    // ========================================================================
    // Customers and properties
    // ========================================================================

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<CustomerRecord>>;

    async fn get_customer(&self, id: &str) -> Result<Option<CustomerRecord>>;

    async fn create_customer(&self, fields: &CustomerFields) -> Result<String>;

    async fn update_customer(&self, id: &str, fields: &CustomerFields) -> Result<()>;

    async fn get_property(&self, id: &str) -> Result<Option<PropertyRecord>>;

    async fn create_property(&self, fields: &PropertyFields) -> Result<String>;

    async fn update_property(&self, id: &str, fields: &PropertyFields) -> Result<()>;

    // ========================================================================
    // Projects and notes
    // ========================================================================

    async fn get_project(&self, id: &str) -> Result<Option<ProjectRecord>>;

    async fn create_project(&self, fields: &ProjectFields) -> Result<String>;

    async fn update_project(&self, id: &str, fields: &ProjectFields) -> Result<()>;

    async fn set_project_active(&self, id: &str, active: bool) -> Result<bool>;

    /// Active projects joined with customer, property and first note.
    async fn list_active_projects(&self) -> Result<Vec<ProjectExport>>;

    async fn create_note(&self, fields: &NoteFields) -> Result<String>;

    /// Note bodies attached to a project, oldest first.
    async fn list_project_notes(&self, project_id: &str) -> Result<Vec<String>>;
}

/// Connect to the store named by `database_url` and apply migrations.
///
/// `sqlite:` URLs open a [`SqliteStore`]; `postgres://` and `postgresql://`
/// open a [`PostgresStore`].
pub async fn connect(database_url: &str) -> Result<Arc<dyn Store>> {
    if database_url.starts_with("sqlite:") {
        let store = SqliteStore::connect(database_url).await?;
        Ok(Arc::new(store))
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://")
    {
        let store = PostgresStore::connect(database_url).await?;
        Ok(Arc::new(store))
    } else {
        Err(SyncError::Config(ConfigError::Invalid(
            "BOARDSYNC_DATABASE_URL",
            "must start with postgres://, postgresql:// or sqlite:",
        )))
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Empty or whitespace-only strings bind as NULL.
pub(crate) fn bind_text(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// JSON object with null and blank-string values removed, ready to merge.
pub(crate) fn json_patch(
    map: &serde_json::Map<String, serde_json::Value>,
) -> Json<serde_json::Value> {
    let cleaned = map
        .iter()
        .filter(|(_, v)| match v {
            serde_json::Value::Null => false,
            serde_json::Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Json(serde_json::Value::Object(cleaned))
}

pub(crate) fn not_found(entity: &'static str, id: &str) -> SyncError {
    SyncError::NotFound {
        entity,
        id: id.to_string(),
    }
}
