// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed store implementation.

use std::str::FromStr;

use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::debug;

use super::{Store, bind_text, json_patch, new_id, not_found};
use crate::error::Result;
use crate::models::{
    AuditEntry, CorrelationEntry, CustomerFields, CustomerRecord, EntityType, NewAuditEntry,
    NoteFields, ProjectExport, ProjectFields, ProjectRecord, PropertyFields, PropertyRecord,
    TeamRecord, UserExport, UserFields, UserRecord, correlation_status,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

const USER_COLUMNS: &str = "id, name, email, role, department, external_team, team_id, metadata, \
     is_active, created_at, updated_at";

const PROJECT_COLUMNS: &str = "id, name, description, status, estimated_value, total_payment, \
     link, company_cam_link, customer_id, property_id, details, is_active, created_at, updated_at";

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an existing pool. Migrations are not applied.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `url` and apply migrations.
    ///
    /// In-memory databases get a single connection so every query sees the
    /// same database.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Apply pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        debug!("SQLite migrations applied");
        Ok(())
    }

    /// Underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    async fn ping(&self) -> Result<()> {
        let _: (i64,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn get_local_id(&self, entity: EntityType, external_id: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT local_id FROM sync_mapping WHERE entity_type = ?1 AND external_id = ?2",
        )
        .bind(entity.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id,)| id))
    }

    async fn get_external_id(&self, entity: EntityType, local_id: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT external_id FROM sync_mapping WHERE entity_type = ?1 AND local_id = ?2",
        )
        .bind(entity.as_str())
        .bind(local_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id,)| id))
    }

    async fn get_correlation(
        &self,
        entity: EntityType,
        external_id: &str,
    ) -> Result<Option<CorrelationEntry>> {
        let row = sqlx::query_as::<_, CorrelationEntry>(
            r#"
            SELECT id, entity_type, local_id, external_id, sync_status, created_at, updated_at
            FROM sync_mapping
            WHERE entity_type = ?1 AND external_id = ?2
            "#,
        )
        .bind(entity.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn add_correlation(
        &self,
        entity: EntityType,
        local_id: &str,
        external_id: &str,
    ) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO sync_mapping (entity_type, local_id, external_id, sync_status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT (entity_type, local_id) DO UPDATE
            SET external_id = excluded.external_id,
                sync_status = excluded.sync_status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(entity.as_str())
        .bind(local_id)
        .bind(external_id)
        .bind(correlation_status::SUCCESS)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_correlation_deleted(&self, entity: EntityType, external_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sync_mapping SET sync_status = ?1, updated_at = ?2
            WHERE entity_type = ?3 AND external_id = ?4
            "#,
        )
        .bind(correlation_status::DELETED)
        .bind(Utc::now())
        .bind(entity.as_str())
        .bind(external_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_correlations(&self, entity: EntityType) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sync_mapping WHERE entity_type = ?1")
                .bind(entity.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn record_audit(&self, entry: &NewAuditEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_logs (entity_type, external_id, operation, status, error_message, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(entry.entity_type.as_str())
        .bind(&entry.external_id)
        .bind(entry.operation.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.error_message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_audit(&self, entity: Option<EntityType>, limit: i64) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, entity_type, external_id, operation, status, error_message, created_at
            FROM sync_logs
            WHERE ?1 IS NULL OR entity_type = ?1
            ORDER BY id DESC
            LIMIT ?2
            "#,
        )
        .bind(entity.map(|e| e.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn ensure_team(&self, name: &str) -> Result<String> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO teams (id, name, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(new_id())
        .bind(name)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let team = sqlx::query_as::<_, TeamRecord>("SELECT id, name FROM teams WHERE name = ?1")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(team.id)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower(?1)"
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_user(&self, fields: &UserFields) -> Result<String> {
        let id = new_id();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, role, department, external_team, team_id,
                               metadata, is_active, created_at, updated_at)
            VALUES (?1, COALESCE(?2, ''), ?3, COALESCE(?4, 'sales_agent'), COALESCE(?5, 'Sales'),
                    ?6, ?7, ?8, 1, ?9, ?9)
            "#,
        )
        .bind(&id)
        .bind(bind_text(&fields.name))
        .bind(bind_text(&fields.email))
        .bind(bind_text(&fields.role))
        .bind(bind_text(&fields.department))
        .bind(bind_text(&fields.external_team))
        .bind(bind_text(&fields.team_id))
        .bind(json_patch(&fields.metadata))
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update_user(&self, id: &str, fields: &UserFields) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                name = COALESCE(?2, name),
                email = COALESCE(?3, email),
                role = COALESCE(?4, role),
                department = COALESCE(?5, department),
                external_team = COALESCE(?6, external_team),
                team_id = COALESCE(?7, team_id),
                metadata = json_patch(COALESCE(metadata, '{}'), ?8),
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(bind_text(&fields.name))
        .bind(bind_text(&fields.email))
        .bind(bind_text(&fields.role))
        .bind(bind_text(&fields.department))
        .bind(bind_text(&fields.external_team))
        .bind(bind_text(&fields.team_id))
        .bind(json_patch(&fields.metadata))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("user", id));
        }
        Ok(())
    }

    async fn set_user_active(&self, id: &str, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET is_active = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_active_users(&self) -> Result<Vec<UserExport>> {
        let rows = sqlx::query_as::<_, UserExport>(
            r#"
            SELECT u.id, u.name, u.email, COALESCE(t.name, u.external_team) AS team_name, u.metadata
            FROM users u
            LEFT JOIN teams t ON u.team_id = t.id
            WHERE u.is_active = 1
            ORDER BY u.created_at, u.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<CustomerRecord>> {
        let row = sqlx::query_as::<_, CustomerRecord>(
            "SELECT id, name, email, phone FROM customers WHERE lower(email) = lower(?1)",
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_customer(&self, id: &str) -> Result<Option<CustomerRecord>> {
        let row = sqlx::query_as::<_, CustomerRecord>(
            "SELECT id, name, email, phone FROM customers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_customer(&self, fields: &CustomerFields) -> Result<String> {
        let id = new_id();
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, email, phone, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&id)
        .bind(bind_text(&fields.name))
        .bind(bind_text(&fields.email))
        .bind(bind_text(&fields.phone))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update_customer(&self, id: &str, fields: &CustomerFields) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE customers SET
                name = COALESCE(?2, name),
                email = COALESCE(?3, email),
                phone = COALESCE(?4, phone),
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(bind_text(&fields.name))
        .bind(bind_text(&fields.email))
        .bind(bind_text(&fields.phone))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("customer", id));
        }
        Ok(())
    }

    async fn get_property(&self, id: &str) -> Result<Option<PropertyRecord>> {
        let row = sqlx::query_as::<_, PropertyRecord>(
            r#"
            SELECT id, customer_id, street, city, state, zip, measurements, one_click_codes
            FROM properties WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_property(&self, fields: &PropertyFields) -> Result<String> {
        let id = new_id();
        sqlx::query(
            r#"
            INSERT INTO properties (id, customer_id, street, city, state, zip,
                                    measurements, one_click_codes, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            "#,
        )
        .bind(&id)
        .bind(bind_text(&fields.customer_id))
        .bind(bind_text(&fields.street))
        .bind(bind_text(&fields.city))
        .bind(bind_text(&fields.state))
        .bind(bind_text(&fields.zip))
        .bind(bind_text(&fields.measurements))
        .bind(bind_text(&fields.one_click_codes))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update_property(&self, id: &str, fields: &PropertyFields) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE properties SET
                customer_id = COALESCE(?2, customer_id),
                street = COALESCE(?3, street),
                city = COALESCE(?4, city),
                state = COALESCE(?5, state),
                zip = COALESCE(?6, zip),
                measurements = COALESCE(?7, measurements),
                one_click_codes = COALESCE(?8, one_click_codes),
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(bind_text(&fields.customer_id))
        .bind(bind_text(&fields.street))
        .bind(bind_text(&fields.city))
        .bind(bind_text(&fields.state))
        .bind(bind_text(&fields.zip))
        .bind(bind_text(&fields.measurements))
        .bind(bind_text(&fields.one_click_codes))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("property", id));
        }
        Ok(())
    }

    async fn get_project(&self, id: &str) -> Result<Option<ProjectRecord>> {
        let row = sqlx::query_as::<_, ProjectRecord>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_project(&self, fields: &ProjectFields) -> Result<String> {
        let id = new_id();
        sqlx::query(
            r#"
            INSERT INTO projects (id, name, description, status, estimated_value, total_payment,
                                  link, company_cam_link, customer_id, property_id, details,
                                  is_active, created_at, updated_at)
            VALUES (?1, COALESCE(?2, ''), ?3, COALESCE(?4, 'pending'), ?5, ?6, ?7, ?8, ?9, ?10,
                    ?11, 1, ?12, ?12)
            "#,
        )
        .bind(&id)
        .bind(bind_text(&fields.name))
        .bind(bind_text(&fields.description))
        .bind(fields.status.map(|s| s.as_str()))
        .bind(fields.estimated_value)
        .bind(fields.total_payment)
        .bind(bind_text(&fields.link))
        .bind(bind_text(&fields.company_cam_link))
        .bind(bind_text(&fields.customer_id))
        .bind(bind_text(&fields.property_id))
        .bind(json_patch(&fields.details))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update_project(&self, id: &str, fields: &ProjectFields) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE projects SET
                name = COALESCE(?2, name),
                description = COALESCE(?3, description),
                status = COALESCE(?4, status),
                estimated_value = COALESCE(?5, estimated_value),
                total_payment = COALESCE(?6, total_payment),
                link = COALESCE(?7, link),
                company_cam_link = COALESCE(?8, company_cam_link),
                customer_id = COALESCE(?9, customer_id),
                property_id = COALESCE(?10, property_id),
                details = json_patch(COALESCE(details, '{}'), ?11),
                updated_at = ?12
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(bind_text(&fields.name))
        .bind(bind_text(&fields.description))
        .bind(fields.status.map(|s| s.as_str()))
        .bind(fields.estimated_value)
        .bind(fields.total_payment)
        .bind(bind_text(&fields.link))
        .bind(bind_text(&fields.company_cam_link))
        .bind(bind_text(&fields.customer_id))
        .bind(bind_text(&fields.property_id))
        .bind(json_patch(&fields.details))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("project", id));
        }
        Ok(())
    }

    async fn set_project_active(&self, id: &str, active: bool) -> Result<bool> {
        let result =
            sqlx::query("UPDATE projects SET is_active = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(active)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_active_projects(&self) -> Result<Vec<ProjectExport>> {
        let rows = sqlx::query_as::<_, ProjectExport>(
            r#"
            SELECT p.id, p.name, p.description, p.status, p.estimated_value, p.total_payment,
                   p.link, p.company_cam_link,
                   c.name AS customer_name, c.email AS customer_email, c.phone AS customer_phone,
                   pr.street, pr.city, pr.state, pr.zip, pr.measurements, pr.one_click_codes,
                   (SELECT n.content FROM notes n WHERE n.project_id = p.id
                    ORDER BY n.created_at LIMIT 1) AS note
            FROM projects p
            LEFT JOIN customers c ON p.customer_id = c.id
            LEFT JOIN properties pr ON p.property_id = pr.id
            WHERE p.is_active = 1
            ORDER BY p.created_at, p.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn create_note(&self, fields: &NoteFields) -> Result<String> {
        let id = new_id();
        sqlx::query(
            r#"
            INSERT INTO notes (id, content, customer_id, project_id, property_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&id)
        .bind(&fields.content)
        .bind(bind_text(&fields.customer_id))
        .bind(bind_text(&fields.project_id))
        .bind(bind_text(&fields.property_id))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn list_project_notes(&self, project_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT content FROM notes WHERE project_id = ?1 ORDER BY created_at, id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(c,)| c).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::models::{AuditStatus, ProjectStatus, SyncOperation};
    use serde_json::json;

    /// Create an in-memory SQLite store for testing.
    async fn test_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");
        let store = SqliteStore::new(pool);
        store.migrate().await.expect("Failed to run migrations");
        store
    }

    fn user_fields(name: &str, email: &str) -> UserFields {
        UserFields {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let store = test_store().await;
        store.migrate().await.expect("second migration run should be a no-op");
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_correlation_round_trip() {
        let store = test_store().await;

        assert!(store.get_local_id(EntityType::User, "ext-1").await.unwrap().is_none());
        store.add_correlation(EntityType::User, "local-1", "ext-1").await.unwrap();

        assert_eq!(
            store.get_local_id(EntityType::User, "ext-1").await.unwrap().as_deref(),
            Some("local-1")
        );
        assert_eq!(
            store.get_external_id(EntityType::User, "local-1").await.unwrap().as_deref(),
            Some("ext-1")
        );
        // Entity types are separate namespaces
        assert!(store.get_local_id(EntityType::Project, "ext-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_readding_correlation_updates_external_id() {
        let store = test_store().await;
        store.add_correlation(EntityType::Project, "p1", "old").await.unwrap();
        store.mark_correlation_deleted(EntityType::Project, "old").await.unwrap();
        store.add_correlation(EntityType::Project, "p1", "new").await.unwrap();

        assert_eq!(store.count_correlations(EntityType::Project).await.unwrap(), 1);
        let entry = store
            .get_correlation(EntityType::Project, "new")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.local_id, "p1");
        assert_eq!(entry.sync_status, correlation_status::SUCCESS);
    }

    #[tokio::test]
    async fn test_external_id_is_unique_per_entity() {
        let store = test_store().await;
        store.add_correlation(EntityType::User, "u1", "ext").await.unwrap();
        let err = store
            .add_correlation(EntityType::User, "u2", "ext")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_mark_deleted_keeps_row() {
        let store = test_store().await;
        store.add_correlation(EntityType::User, "u1", "ext").await.unwrap();

        assert!(store.mark_correlation_deleted(EntityType::User, "ext").await.unwrap());
        assert!(!store.mark_correlation_deleted(EntityType::User, "other").await.unwrap());

        let entry = store.get_correlation(EntityType::User, "ext").await.unwrap().unwrap();
        assert_eq!(entry.sync_status, correlation_status::DELETED);
    }

    #[tokio::test]
    async fn test_audit_log_newest_first() {
        let store = test_store().await;
        store
            .record_audit(&NewAuditEntry::success(EntityType::User, "1", SyncOperation::Create))
            .await
            .unwrap();
        store
            .record_audit(&NewAuditEntry::warning(EntityType::User, "2", "Empty email address"))
            .await
            .unwrap();
        store
            .record_audit(&NewAuditEntry::failure(
                EntityType::Project,
                "3",
                SyncOperation::Update,
                "boom",
            ))
            .await
            .unwrap();

        let users = store.list_audit(Some(EntityType::User), 10).await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].external_id, "2");
        assert_eq!(users[0].operation, "skip");
        assert_eq!(users[0].status, AuditStatus::Warning.as_str());

        let all = store.list_audit(None, 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_ensure_team_is_idempotent() {
        let store = test_store().await;
        let a = store.ensure_team("North").await.unwrap();
        let b = store.ensure_team("North").await.unwrap();
        let c = store.ensure_team("South").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_user_coalesce_update() {
        let store = test_store().await;
        let mut fields = user_fields("Jane Doe", "jane@x.com");
        fields.metadata.insert("phone".into(), json!("555-0100"));
        fields.metadata.insert("city".into(), json!("Austin"));
        let id = store.create_user(&fields).await.unwrap();

        let mut update = UserFields {
            name: Some(String::new()),
            ..Default::default()
        };
        update.metadata.insert("phone".into(), json!(""));
        update.metadata.insert("city".into(), json!("Dallas"));
        update.metadata.insert("col_x".into(), json!("extra"));
        store.update_user(&id, &update).await.unwrap();

        let user = store.get_user(&id).await.unwrap().unwrap();
        assert_eq!(user.name, "Jane Doe");
        assert_eq!(user.email.as_deref(), Some("jane@x.com"));
        assert_eq!(user.role, "sales_agent");
        assert_eq!(user.department, "Sales");
        assert_eq!(
            user.metadata.0,
            json!({ "phone": "555-0100", "city": "Dallas", "col_x": "extra" })
        );
    }

    #[tokio::test]
    async fn test_update_missing_user_is_not_found() {
        let store = test_store().await;
        let err = store
            .update_user("missing", &user_fields("A", "a@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound { entity: "user", .. }));
    }

    #[tokio::test]
    async fn test_find_user_by_email_ignores_case() {
        let store = test_store().await;
        let id = store.create_user(&user_fields("A", "Mixed@X.com")).await.unwrap();
        let found = store.find_user_by_email("mixed@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, id);
    }

    #[tokio::test]
    async fn test_active_users_join_team() {
        let store = test_store().await;
        let team_id = store.ensure_team("North").await.unwrap();
        let mut fields = user_fields("A", "a@x.com");
        fields.team_id = Some(team_id);
        let active = store.create_user(&fields).await.unwrap();
        let inactive = store.create_user(&user_fields("B", "b@x.com")).await.unwrap();
        assert!(store.set_user_active(&inactive, false).await.unwrap());

        let users = store.list_active_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, active);
        assert_eq!(users[0].team_name.as_deref(), Some("North"));
    }

    #[tokio::test]
    async fn test_project_graph_and_export() {
        let store = test_store().await;
        let customer_id = store
            .create_customer(&CustomerFields {
                name: Some("John Smith".into()),
                email: Some("john@x.com".into()),
                phone: None,
            })
            .await
            .unwrap();
        let property_id = store
            .create_property(&PropertyFields {
                customer_id: Some(customer_id.clone()),
                street: Some("12 Main St".into()),
                city: Some("Springfield".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let mut details = serde_json::Map::new();
        details.insert("claim_number".into(), json!("C-1"));
        let project_id = store
            .create_project(&ProjectFields {
                name: Some("Roof".into()),
                status: Some(ProjectStatus::Active),
                estimated_value: Some(1200.5),
                customer_id: Some(customer_id.clone()),
                property_id: Some(property_id.clone()),
                details,
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .create_note(&NoteFields {
                content: "Call first".into(),
                customer_id: Some(customer_id),
                project_id: Some(project_id.clone()),
                property_id: Some(property_id),
            })
            .await
            .unwrap();

        let exports = store.list_active_projects().await.unwrap();
        assert_eq!(exports.len(), 1);
        let export = &exports[0];
        assert_eq!(export.status, "active");
        assert_eq!(export.customer_email.as_deref(), Some("john@x.com"));
        assert_eq!(export.city.as_deref(), Some("Springfield"));
        assert_eq!(export.note.as_deref(), Some("Call first"));
        assert_eq!(export.estimated_value, Some(1200.5));

        let project = store.get_project(&project_id).await.unwrap().unwrap();
        assert_eq!(project.details.0, json!({ "claim_number": "C-1" }));

        assert!(store.set_project_active(&project_id, false).await.unwrap());
        assert!(store.list_active_projects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_project_update_coalesces() {
        let store = test_store().await;
        let id = store
            .create_project(&ProjectFields {
                name: Some("Roof".into()),
                description: Some("Full replacement".into()),
                estimated_value: Some(100.0),
                ..Default::default()
            })
            .await
            .unwrap();

        store
            .update_project(
                &id,
                &ProjectFields {
                    description: Some("".into()),
                    status: Some(ProjectStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let project = store.get_project(&id).await.unwrap().unwrap();
        assert_eq!(project.name, "Roof");
        assert_eq!(project.description.as_deref(), Some("Full replacement"));
        assert_eq!(project.estimated_value, Some(100.0));
        assert_eq!(project.status, "completed");
    }
}
