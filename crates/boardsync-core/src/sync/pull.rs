// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Board → store.

use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::{
    Direction, ItemPullOutcome, Outcome, SyncEngine, SyncOptions, SyncReport, finish, log_batch,
};
use crate::error::Result;
use crate::mapping::{MappedItem, parse_address, project_fields as pf, user_fields as uf};
use crate::models::{
    BoardItem, CustomerFields, EntityType, NewAuditEntry, NoteFields, ProjectFields,
    ProjectStatus, PropertyFields, SyncOperation, UserFields,
};

/// Domain used for customers that have no email on the board.
pub const PLACEHOLDER_EMAIL_DOMAIN: &str = "placeholder.example";

/// Project fields stored in dedicated columns rather than `details`.
const PROJECT_COLUMN_FIELDS: &[&str] = &[
    pf::STATUS,
    pf::LINK,
    pf::DESCRIPTION,
    pf::COMPANY_CAM_LINK,
    pf::ESTIMATED_VALUE,
    pf::TOTAL_PAYMENT,
    pf::CUSTOMER_NAME,
    pf::EMAIL,
    pf::PHONE,
    pf::ADDRESS,
    pf::NOTES,
    pf::MEASUREMENTS,
    pf::ONE_CLICK_CODES,
];

/// User fields copied into `metadata` under their own name.
const USER_METADATA_FIELDS: &[&str] = &[
    uf::PHONE,
    uf::SHIRT_SIZE,
    uf::IDENTIFICATION_FILES,
    uf::ONBOARDING_FILES,
];

impl SyncEngine {
    /// Pull one entity type from its board into the store.
    pub async fn pull(&self, entity: EntityType, opts: &SyncOptions) -> Result<SyncReport> {
        let started = Instant::now();
        let mut report = SyncReport::new(entity, Direction::BoardToStore);

        let items = self.fetch(entity, opts).await?;
        report.fetched = items.len();

        let batch_size = opts.batch_size.max(1);
        let batches = items.len().div_ceil(batch_size);
        for (index, batch) in items.chunks(batch_size).enumerate() {
            log_batch(entity, Direction::BoardToStore, index, batches, batch.len());

            for item in batch {
                self.pull_one(entity, item, &mut report).await?;
            }
        }

        Ok(finish(report, started))
    }

    /// Pull a single board item, as announced by a webhook.
    ///
    /// Only the mapped columns are kept so the result matches a full pull.
    pub async fn pull_item(&self, board_id: &str, item_id: &str) -> Result<ItemPullOutcome> {
        let Some(entity) = self.entity_for_board(board_id) else {
            return Ok(ItemPullOutcome::UnknownBoard);
        };
        let started = Instant::now();

        let Some(mut item) = self.board.get_item(item_id).await? else {
            info!(entity = %entity, item_id, "Item is no longer on the board");
            return Ok(ItemPullOutcome::NotFound);
        };
        let column_ids = self.column_map(entity).column_ids();
        if !column_ids.is_empty() {
            item.column_values.retain(|c| column_ids.contains(&c.id));
        }

        let mut report = SyncReport::new(entity, Direction::BoardToStore);
        report.fetched = 1;
        self.pull_one(entity, &item, &mut report).await?;
        Ok(ItemPullOutcome::Pulled(finish(report, started)))
    }

    /// Upsert one item and count it. Record failures are audited, not returned.
    async fn pull_one(&self, entity: EntityType, item: &BoardItem, report: &mut SyncReport) -> Result<()> {
        let local_id = self.store.get_local_id(entity, &item.id).await?;
        let result = match entity {
            EntityType::User => self.pull_user(item, local_id.as_deref()).await,
            EntityType::Project => self.pull_project(item, local_id.as_deref()).await,
        };

        match result {
            Ok(outcome) => report.record(outcome),
            Err(e) => {
                report.failed += 1;
                let operation = if local_id.is_some() {
                    SyncOperation::Update
                } else {
                    SyncOperation::Create
                };
                warn!(
                    entity = %entity,
                    item_id = %item.id,
                    error = %e,
                    "Failed to pull item"
                );
                self.store
                    .record_audit(&NewAuditEntry::failure(entity, &item.id, operation, &e))
                    .await?;
            }
        }
        Ok(())
    }

    async fn pull_user(&self, item: &BoardItem, local_id: Option<&str>) -> Result<Outcome> {
        let mapped = self.users_map.map_item(item);
        let Some(mut fields) = user_fields(&mapped) else {
            debug!(item_id = %item.id, "Skipping user item without name or email");
            return Ok(Outcome::Skipped);
        };

        if fields.email.is_none() {
            warn!(item_id = %item.id, name = ?fields.name, "Skipping user with empty email");
            self.store
                .record_audit(&NewAuditEntry::warning(
                    EntityType::User,
                    &item.id,
                    "Empty email address",
                ))
                .await?;
            return Ok(Outcome::Skipped);
        }

        if let Some(team) = &fields.external_team {
            fields.team_id = Some(self.store.ensure_team(team).await?);
        }

        let outcome = match local_id {
            Some(id) => {
                self.store.update_user(id, &fields).await?;
                Outcome::Updated
            }
            None => {
                let email = fields.email.as_deref().unwrap_or_default();
                match self.store.find_user_by_email(email).await? {
                    Some(existing) => {
                        self.store.update_user(&existing.id, &fields).await?;
                        self.store
                            .add_correlation(EntityType::User, &existing.id, &item.id)
                            .await?;
                        Outcome::Updated
                    }
                    None => {
                        let id = self.store.create_user(&fields).await?;
                        self.store
                            .add_correlation(EntityType::User, &id, &item.id)
                            .await?;
                        Outcome::Created
                    }
                }
            }
        };

        self.audit_success(EntityType::User, &item.id, outcome).await?;
        Ok(outcome)
    }

    async fn pull_project(&self, item: &BoardItem, local_id: Option<&str>) -> Result<Outcome> {
        let mapped = self.projects_map.map_item(item);
        let mut customer = customer_fields(&mapped);
        let mut property = property_fields(&mapped);
        let mut project = project_fields(&mapped);

        let outcome = match local_id {
            Some(id) => {
                self.store.update_project(id, &project).await?;
                if let Some(record) = self.store.get_project(id).await? {
                    if let Some(customer_id) = &record.customer_id {
                        self.store.update_customer(customer_id, &customer).await?;
                    }
                    if let Some(property_id) = &record.property_id {
                        self.store.update_property(property_id, &property).await?;
                    }
                }
                Outcome::Updated
            }
            None => {
                let existing = match &customer.email {
                    Some(email) => self.store.find_customer_by_email(email).await?,
                    None => None,
                };
                let customer_id = match existing {
                    Some(found) => found.id,
                    None => {
                        if customer.email.is_none() {
                            customer.email = Some(placeholder_email(customer.name.as_deref()));
                        }
                        self.store.create_customer(&customer).await?
                    }
                };

                property.customer_id = Some(customer_id.clone());
                let property_id = self.store.create_property(&property).await?;

                project.customer_id = Some(customer_id.clone());
                project.property_id = Some(property_id.clone());
                let project_id = self.store.create_project(&project).await?;

                if let Some(content) = mapped.owned(pf::NOTES) {
                    self.store
                        .create_note(&NoteFields {
                            content,
                            customer_id: Some(customer_id),
                            project_id: Some(project_id.clone()),
                            property_id: Some(property_id),
                        })
                        .await?;
                }

                self.store
                    .add_correlation(EntityType::Project, &project_id, &item.id)
                    .await?;
                Outcome::Created
            }
        };

        self.audit_success(EntityType::Project, &item.id, outcome).await?;
        Ok(outcome)
    }

    async fn audit_success(&self, entity: EntityType, item_id: &str, outcome: Outcome) -> Result<()> {
        let operation = match outcome {
            Outcome::Created => SyncOperation::Create,
            Outcome::Updated => SyncOperation::Update,
            Outcome::Skipped => SyncOperation::Skip,
        };
        self.store
            .record_audit(&NewAuditEntry::success(entity, item_id, operation))
            .await
    }
}

/// User fields from a mapped item, or `None` when it has neither name nor email.
fn user_fields(mapped: &MappedItem) -> Option<UserFields> {
    let name = [mapped.get(uf::FIRST_NAME), mapped.get(uf::LAST_NAME)]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let name = (!name.is_empty()).then_some(name);
    let email = mapped.owned(uf::EMAIL);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut metadata = Map::new();
    for (column, value) in &mapped.unmapped {
        metadata.insert(column.clone(), Value::String(value.clone()));
    }
    for field in USER_METADATA_FIELDS {
        if let Some(value) = mapped.get(field) {
            metadata.insert(field.to_string(), Value::String(value.to_string()));
        }
    }

    // Explicit city/state/zip columns win over values parsed from the address
    let address = mapped.get(uf::ADDRESS).map(parse_address).unwrap_or_default();
    let location = [
        ("street", address.street),
        ("city", mapped.owned(uf::CITY).or(address.city)),
        ("state", mapped.owned(uf::STATE).or(address.state)),
        ("zip", mapped.owned(uf::ZIP).or(address.zip)),
    ];
    for (key, value) in location {
        if let Some(value) = value {
            metadata.insert(key.to_string(), Value::String(value));
        }
    }

    Some(UserFields {
        name,
        email,
        role: None,
        department: None,
        external_team: mapped.owned(uf::TEAM),
        team_id: None,
        metadata,
    })
}

fn customer_fields(mapped: &MappedItem) -> CustomerFields {
    CustomerFields {
        name: mapped.owned(pf::CUSTOMER_NAME),
        email: mapped.owned(pf::EMAIL),
        phone: mapped.owned(pf::PHONE),
    }
}

fn property_fields(mapped: &MappedItem) -> PropertyFields {
    let address = mapped.get(pf::ADDRESS).map(parse_address).unwrap_or_default();
    PropertyFields {
        customer_id: None,
        street: address.street,
        city: address.city,
        state: address.state,
        zip: address.zip,
        measurements: mapped.owned(pf::MEASUREMENTS),
        one_click_codes: mapped.owned(pf::ONE_CLICK_CODES),
    }
}

fn project_fields(mapped: &MappedItem) -> ProjectFields {
    let mut details = Map::new();
    for (field, value) in &mapped.fields {
        if !PROJECT_COLUMN_FIELDS.contains(&field.as_str()) {
            details.insert(field.clone(), Value::String(value.clone()));
        }
    }
    for (column, value) in &mapped.unmapped {
        details.insert(column.clone(), Value::String(value.clone()));
    }

    let mut amount = |field: &str| -> Option<f64> {
        let raw = mapped.get(field)?;
        let parsed = parse_amount(raw);
        if parsed.is_none() {
            // Keep text the number parser could not read
            details.insert(field.to_string(), Value::String(raw.to_string()));
        }
        parsed
    };
    let estimated_value = amount(pf::ESTIMATED_VALUE);
    let total_payment = amount(pf::TOTAL_PAYMENT);

    let name = if mapped.name.is_empty() {
        mapped.owned(pf::JOB_NAME)
    } else {
        Some(mapped.name.clone())
    };

    ProjectFields {
        name,
        description: mapped.owned(pf::DESCRIPTION),
        status: mapped.get(pf::STATUS).map(ProjectStatus::from_board_label),
        estimated_value,
        total_payment,
        link: mapped.owned(pf::LINK),
        company_cam_link: mapped.owned(pf::COMPANY_CAM_LINK),
        customer_id: None,
        property_id: None,
        details,
    }
}

/// Parse a money amount such as `$1,250.00`.
pub(crate) fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `{name}_{8 hex}@placeholder.example`, unique per call.
pub(crate) fn placeholder_email(name: Option<&str>) -> String {
    let name_part = name
        .map(|n| n.trim().to_lowercase().replace(char::is_whitespace, "_"))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}@{}", name_part, &suffix[..8], PLACEHOLDER_EMAIL_DOMAIN)
}
