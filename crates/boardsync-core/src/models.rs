// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Data model shared by the board client, the store and the sync engine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

// ============================================================================
// Board-side types
// ============================================================================

/// One column cell of a board item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnValue {
    /// Opaque column identifier (not the display title).
    pub id: String,
    /// Display text as rendered by the board.
    #[serde(default)]
    pub text: Option<String>,
    /// Raw JSON-encoded value.
    #[serde(default)]
    pub value: Option<String>,
}

impl ColumnValue {
    /// Column with display text only.
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: Some(text.into()),
            value: None,
        }
    }
}

/// An item (row) on a remote board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardItem {
    /// Opaque external identifier.
    pub id: String,
    /// Item name.
    pub name: String,
    /// Column cells in board order.
    #[serde(default)]
    pub column_values: Vec<ColumnValue>,
}

impl BoardItem {
    /// Item with the given columns.
    pub fn new(id: impl Into<String>, name: impl Into<String>, columns: Vec<ColumnValue>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            column_values: columns,
        }
    }

    /// Display text of a column, if the column is present and non-empty.
    pub fn column_text(&self, column_id: &str) -> Option<&str> {
        self.column_values
            .iter()
            .find(|c| c.id == column_id)
            .and_then(|c| c.text.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

/// Account the API token belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Account user id.
    #[serde(default)]
    pub id: Option<String>,
    /// Display name.
    pub name: String,
    /// Login email.
    #[serde(default)]
    pub email: Option<String>,
}

/// A webhook subscription registered on the board service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSubscription {
    /// Subscription id.
    pub id: String,
    /// Board the subscription watches.
    pub board_id: String,
    /// Event kind (e.g. `create_item`).
    pub event: String,
    /// Delivery URL, when the API reports it.
    #[serde(default)]
    pub url: Option<String>,
}

// ============================================================================
// Enumerations
// ============================================================================

/// Entity kinds that are synchronized and correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// Sales staff board item <-> `users` row.
    User,
    /// Master project board item <-> `projects` row.
    Project,
}

impl EntityType {
    /// All synchronized entity types, in sync order.
    pub const ALL: [EntityType; 2] = [EntityType::User, EntityType::Project];

    /// Lowercase identifier stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Project => "project",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "users" => Ok(Self::User),
            "project" | "projects" => Ok(Self::Project),
            other => Err(format!("unknown entity type '{}'", other)),
        }
    }
}

/// Kind of operation recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    /// A new record or item was created.
    Create,
    /// An existing record or item was updated.
    Update,
    /// The source record was not synchronized.
    Skip,
    /// A record was soft-deleted.
    Delete,
}

impl SyncOperation {
    /// Lowercase identifier stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Skip => "skip",
            Self::Delete => "delete",
        }
    }
}

/// Outcome of one audited attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    /// Operation applied.
    Success,
    /// Operation skipped for a data-quality reason.
    Warning,
    /// Operation failed.
    Error,
}

impl AuditStatus {
    /// Lowercase identifier stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// `sync_status` values of a correlation entry.
pub mod correlation_status {
    /// The correlated pair is live.
    pub const SUCCESS: &str = "success";
    /// The external item was deleted; the local record is inactive.
    pub const DELETED: &str = "deleted";
}

/// Lifecycle state of a local project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    /// Not yet started.
    Pending,
    /// Work in progress.
    Active,
    /// Finished or approved.
    Completed,
    /// Cancelled or rejected.
    Cancelled,
}

impl ProjectStatus {
    /// Map a board status label to a project status. Unknown labels are pending.
    pub fn from_board_label(label: &str) -> Self {
        match label.trim() {
            "In Progress" | "Working" => Self::Active,
            "Done" | "Completed" | "Approved" => Self::Completed,
            "Cancelled" | "Rejected" => Self::Cancelled,
            _ => Self::Pending,
        }
    }

    /// Board label written back when pushing.
    pub fn board_label(&self) -> &'static str {
        match self {
            Self::Pending => "New",
            Self::Active => "In Progress",
            Self::Completed => "Done",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Lowercase identifier stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse a stored status, defaulting to pending.
    pub fn from_stored(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            _ => Self::Pending,
        }
    }
}

// ============================================================================
// Correlation and audit rows
// ============================================================================

/// Durable link between one external item and one local record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CorrelationEntry {
    /// Database primary key.
    pub id: i64,
    /// Entity type (`user`, `project`).
    pub entity_type: String,
    /// Local record id.
    pub local_id: String,
    /// External item id.
    pub external_id: String,
    /// `success` or `deleted`.
    pub sync_status: String,
    /// When the pair was first correlated.
    pub created_at: DateTime<Utc>,
    /// Last remap or status change.
    pub updated_at: DateTime<Utc>,
}

/// A row to append to the audit log.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    /// Entity type.
    pub entity_type: EntityType,
    /// External item id (`unknown` when no item exists yet).
    pub external_id: String,
    /// Operation attempted.
    pub operation: SyncOperation,
    /// Outcome.
    pub status: AuditStatus,
    /// Error or warning detail.
    pub error_message: Option<String>,
}

impl NewAuditEntry {
    /// Successful operation.
    pub fn success(entity_type: EntityType, external_id: &str, operation: SyncOperation) -> Self {
        Self {
            entity_type,
            external_id: external_id.to_string(),
            operation,
            status: AuditStatus::Success,
            error_message: None,
        }
    }

    /// Failed operation with its error text.
    pub fn failure(
        entity_type: EntityType,
        external_id: &str,
        operation: SyncOperation,
        error: impl ToString,
    ) -> Self {
        Self {
            entity_type,
            external_id: external_id.to_string(),
            operation,
            status: AuditStatus::Error,
            error_message: Some(error.to_string()),
        }
    }

    /// Skipped record with a warning.
    pub fn warning(entity_type: EntityType, external_id: &str, message: impl ToString) -> Self {
        Self {
            entity_type,
            external_id: external_id.to_string(),
            operation: SyncOperation::Skip,
            status: AuditStatus::Warning,
            error_message: Some(message.to_string()),
        }
    }
}

/// Audit log row.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AuditEntry {
    /// Database primary key.
    pub id: i64,
    /// Entity type.
    pub entity_type: String,
    /// External item id.
    pub external_id: String,
    /// Operation attempted.
    pub operation: String,
    /// Outcome.
    pub status: String,
    /// Error or warning detail.
    pub error_message: Option<String>,
    /// When the attempt was made.
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Local records
// ============================================================================

/// Local user row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    /// Primary key.
    pub id: String,
    /// Full name.
    pub name: String,
    /// Natural key.
    pub email: Option<String>,
    /// Role (default `sales_agent`).
    pub role: String,
    /// Department (default `Sales`).
    pub department: String,
    /// Team name as shown on the board.
    pub external_team: Option<String>,
    /// Resolved team row.
    pub team_id: Option<String>,
    /// Contact details and unmapped board columns.
    pub metadata: Json<serde_json::Value>,
    /// Soft-delete flag.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// User fields written by a sync. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct UserFields {
    /// Full name.
    pub name: Option<String>,
    /// Email.
    pub email: Option<String>,
    /// Role.
    pub role: Option<String>,
    /// Department.
    pub department: Option<String>,
    /// Board team name.
    pub external_team: Option<String>,
    /// Resolved team id.
    pub team_id: Option<String>,
    /// Keys merged into the stored metadata object.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// User row joined with its team, as exported to the board.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserExport {
    /// Primary key.
    pub id: String,
    /// Full name.
    pub name: String,
    /// Email.
    pub email: Option<String>,
    /// Team name, from the teams table or the board value.
    pub team_name: Option<String>,
    /// Metadata object.
    pub metadata: Json<serde_json::Value>,
}

/// Local team row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TeamRecord {
    /// Primary key.
    pub id: String,
    /// Unique name.
    pub name: String,
}

/// Local customer row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerRecord {
    /// Primary key.
    pub id: String,
    /// Full name.
    pub name: Option<String>,
    /// Natural key.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
}

/// Customer fields written by a sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerFields {
    /// Full name.
    pub name: Option<String>,
    /// Email.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
}

/// Local property row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PropertyRecord {
    /// Primary key.
    pub id: String,
    /// Owning customer.
    pub customer_id: Option<String>,
    /// Street line.
    pub street: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State abbreviation.
    pub state: Option<String>,
    /// ZIP code.
    pub zip: Option<String>,
    /// Measurement file references.
    pub measurements: Option<String>,
    /// One-click code file references.
    pub one_click_codes: Option<String>,
}

/// Property fields written by a sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyFields {
    /// Owning customer.
    pub customer_id: Option<String>,
    /// Street line.
    pub street: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State abbreviation.
    pub state: Option<String>,
    /// ZIP code.
    pub zip: Option<String>,
    /// Measurement file references.
    pub measurements: Option<String>,
    /// One-click code file references.
    pub one_click_codes: Option<String>,
}

/// Local project row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectRecord {
    /// Primary key.
    pub id: String,
    /// Project name (board item name).
    pub name: String,
    /// Free-text description.
    pub description: Option<String>,
    /// `pending`, `active`, `completed` or `cancelled`.
    pub status: String,
    /// Estimated value.
    pub estimated_value: Option<f64>,
    /// Payments received.
    pub total_payment: Option<f64>,
    /// Job link.
    pub link: Option<String>,
    /// Photo documentation link.
    pub company_cam_link: Option<String>,
    /// Customer link.
    pub customer_id: Option<String>,
    /// Property link.
    pub property_id: Option<String>,
    /// Remaining mapped fields and unmapped board columns.
    pub details: Json<serde_json::Value>,
    /// Soft-delete flag.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Project fields written by a sync.
#[derive(Debug, Clone, Default)]
pub struct ProjectFields {
    /// Project name.
    pub name: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Status.
    pub status: Option<ProjectStatus>,
    /// Estimated value.
    pub estimated_value: Option<f64>,
    /// Payments received.
    pub total_payment: Option<f64>,
    /// Job link.
    pub link: Option<String>,
    /// Photo documentation link.
    pub company_cam_link: Option<String>,
    /// Customer link.
    pub customer_id: Option<String>,
    /// Property link.
    pub property_id: Option<String>,
    /// Keys merged into the stored details object.
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// Project joined with customer, property and its first note.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectExport {
    /// Project id.
    pub id: String,
    /// Project name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Stored status.
    pub status: String,
    /// Estimated value.
    pub estimated_value: Option<f64>,
    /// Payments received.
    pub total_payment: Option<f64>,
    /// Job link.
    pub link: Option<String>,
    /// Photo documentation link.
    pub company_cam_link: Option<String>,
    /// Customer name.
    pub customer_name: Option<String>,
    /// Customer email.
    pub customer_email: Option<String>,
    /// Customer phone.
    pub customer_phone: Option<String>,
    /// Street line.
    pub street: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State.
    pub state: Option<String>,
    /// ZIP code.
    pub zip: Option<String>,
    /// Measurement references.
    pub measurements: Option<String>,
    /// One-click code references.
    pub one_click_codes: Option<String>,
    /// Customer note content.
    pub note: Option<String>,
}

/// Note fields.
#[derive(Debug, Clone, Default)]
pub struct NoteFields {
    /// Note body.
    pub content: String,
    /// Customer link.
    pub customer_id: Option<String>,
    /// Project link.
    pub project_id: Option<String>,
    /// Property link.
    pub property_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_round_trip() {
        for entity in EntityType::ALL {
            assert_eq!(entity.as_str().parse::<EntityType>().unwrap(), entity);
        }
        assert_eq!("Projects".parse::<EntityType>().unwrap(), EntityType::Project);
        assert!("invoice".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_project_status_from_board_label() {
        assert_eq!(ProjectStatus::from_board_label("New"), ProjectStatus::Pending);
        assert_eq!(ProjectStatus::from_board_label("Hold"), ProjectStatus::Pending);
        assert_eq!(
            ProjectStatus::from_board_label("In Progress"),
            ProjectStatus::Active
        );
        assert_eq!(
            ProjectStatus::from_board_label("Approved"),
            ProjectStatus::Completed
        );
        assert_eq!(
            ProjectStatus::from_board_label("Rejected"),
            ProjectStatus::Cancelled
        );
        assert_eq!(
            ProjectStatus::from_board_label("something else"),
            ProjectStatus::Pending
        );
    }

    #[test]
    fn test_board_label_maps_back() {
        for status in [
            ProjectStatus::Pending,
            ProjectStatus::Active,
            ProjectStatus::Completed,
            ProjectStatus::Cancelled,
        ] {
            assert_eq!(ProjectStatus::from_board_label(status.board_label()), status);
            assert_eq!(ProjectStatus::from_stored(status.as_str()), status);
        }
    }

    #[test]
    fn test_column_text_ignores_blank() {
        let item = BoardItem::new(
            "1",
            "Acme",
            vec![
                ColumnValue::text("email", "  "),
                ColumnValue::text("phone", "555-0100"),
            ],
        );
        assert_eq!(item.column_text("email"), None);
        assert_eq!(item.column_text("phone"), Some("555-0100"));
        assert_eq!(item.column_text("missing"), None);
    }

    #[test]
    fn test_board_item_deserializes_without_columns() {
        let item: BoardItem = serde_json::from_str(r#"{"id":"7","name":"Bare"}"#).unwrap();
        assert!(item.column_values.is_empty());
    }
}
