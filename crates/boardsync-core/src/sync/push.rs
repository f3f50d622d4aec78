// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Store → board.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, warn};

use super::pull::PLACEHOLDER_EMAIL_DOMAIN;
use super::{Direction, Outcome, SyncEngine, SyncOptions, SyncReport, finish, log_batch};
use crate::board::ColumnInput;
use crate::error::Result;
use crate::mapping::{format_address, project_fields as pf, user_fields as uf};
use crate::models::{EntityType, NewAuditEntry, ProjectExport, ProjectStatus, SyncOperation, UserExport};

/// A local record flattened into board fields.
struct Outgoing {
    local_id: String,
    name: String,
    fields: BTreeMap<String, String>,
}

impl SyncEngine {
    /// Push active local records of one entity type to its board.
    pub async fn push(&self, entity: EntityType, opts: &SyncOptions) -> Result<SyncReport> {
        let started = Instant::now();
        let mut report = SyncReport::new(entity, Direction::StoreToBoard);

        let mut records: Vec<Outgoing> = match entity {
            EntityType::User => self
                .store
                .list_active_users()
                .await?
                .into_iter()
                .map(user_outgoing)
                .collect(),
            EntityType::Project => self
                .store
                .list_active_projects()
                .await?
                .into_iter()
                .map(project_outgoing)
                .collect(),
        };
        if let Some(limit) = opts.limit {
            records.truncate(limit);
        }
        report.fetched = records.len();

        let batch_size = opts.batch_size.max(1);
        let batches = records.len().div_ceil(batch_size);
        for (index, batch) in records.chunks(batch_size).enumerate() {
            log_batch(entity, Direction::StoreToBoard, index, batches, batch.len());

            for record in batch {
                let external_id = self.store.get_external_id(entity, &record.local_id).await?;
                match self.push_record(entity, record, external_id.as_deref()).await {
                    Ok(outcome) => report.record(outcome),
                    Err(e) => {
                        report.failed += 1;
                        let (operation, audit_id) = match &external_id {
                            Some(id) => (SyncOperation::Update, id.as_str()),
                            None => (SyncOperation::Create, "unknown"),
                        };
                        warn!(
                            entity = %entity,
                            local_id = %record.local_id,
                            error = %e,
                            "Failed to push record"
                        );
                        self.store
                            .record_audit(&NewAuditEntry::failure(entity, audit_id, operation, &e))
                            .await?;
                    }
                }
            }
        }

        Ok(finish(report, started))
    }

    async fn push_record(
        &self,
        entity: EntityType,
        record: &Outgoing,
        external_id: Option<&str>,
    ) -> Result<Outcome> {
        let board_id = self.board_for(entity);
        let columns: Vec<(String, ColumnInput)> = self
            .column_map(entity)
            .to_columns(&record.fields)
            .into_iter()
            .map(|(column, value)| (column, ColumnInput::from(value)))
            .collect();

        match external_id {
            Some(item_id) => {
                for (column, value) in &columns {
                    self.board
                        .change_column_value(board_id, item_id, column, value)
                        .await?;
                }
                debug!(entity = %entity, item_id, columns = columns.len(), "Updated board item");
                self.store
                    .record_audit(&NewAuditEntry::success(entity, item_id, SyncOperation::Update))
                    .await?;
                Ok(Outcome::Updated)
            }
            None => {
                let item_id = self.board.create_item(board_id, &record.name, &columns).await?;
                self.store
                    .add_correlation(entity, &record.local_id, &item_id)
                    .await?;
                debug!(entity = %entity, item_id = %item_id, "Created board item");
                self.store
                    .record_audit(&NewAuditEntry::success(entity, &item_id, SyncOperation::Create))
                    .await?;
                Ok(Outcome::Created)
            }
        }
    }
}

fn insert(fields: &mut BTreeMap<String, String>, field: &str, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        fields.insert(field.to_string(), value);
    }
}

/// Board item names must not be empty.
fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn user_outgoing(user: UserExport) -> Outgoing {
    let metadata = |key: &str| {
        user.metadata
            .0
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    let mut fields = BTreeMap::new();
    let (first, last) = match user.name.trim().split_once(char::is_whitespace) {
        Some((first, last)) => (first.to_string(), last.trim().to_string()),
        None => (user.name.trim().to_string(), String::new()),
    };
    insert(&mut fields, uf::FIRST_NAME, Some(first));
    insert(&mut fields, uf::LAST_NAME, Some(last));
    insert(&mut fields, uf::EMAIL, user.email.clone());
    insert(&mut fields, uf::TEAM, user.team_name.clone());
    insert(&mut fields, uf::PHONE, metadata("phone"));
    insert(&mut fields, uf::ADDRESS, metadata("street"));
    insert(&mut fields, uf::CITY, metadata("city"));
    insert(&mut fields, uf::STATE, metadata("state"));
    insert(&mut fields, uf::ZIP, metadata("zip"));
    insert(&mut fields, uf::SHIRT_SIZE, metadata(uf::SHIRT_SIZE));

    let name = non_blank(&user.name)
        .or_else(|| user.email.as_deref().and_then(non_blank))
        .unwrap_or_else(|| "New User".to_string());

    Outgoing {
        local_id: user.id.clone(),
        name,
        fields,
    }
}

fn project_outgoing(project: ProjectExport) -> Outgoing {
    let name = non_blank(&project.name).unwrap_or_else(|| {
        let customer = project
            .customer_name
            .as_deref()
            .and_then(non_blank)
            .unwrap_or_else(|| "Unknown Customer".to_string());
        format!("Project for {}", customer)
    });

    let mut fields = BTreeMap::new();
    let status = ProjectStatus::from_stored(&project.status);
    insert(&mut fields, pf::STATUS, Some(status.board_label().to_string()));
    insert(&mut fields, pf::LINK, project.link);
    insert(&mut fields, pf::DESCRIPTION, project.description);
    insert(&mut fields, pf::COMPANY_CAM_LINK, project.company_cam_link);
    insert(&mut fields, pf::ESTIMATED_VALUE, project.estimated_value.map(|v| v.to_string()));
    insert(&mut fields, pf::TOTAL_PAYMENT, project.total_payment.map(|v| v.to_string()));
    insert(&mut fields, pf::CUSTOMER_NAME, project.customer_name);
    let email = project
        .customer_email
        .filter(|e| !e.ends_with(&format!("@{}", PLACEHOLDER_EMAIL_DOMAIN)));
    insert(&mut fields, pf::EMAIL, email);
    insert(&mut fields, pf::PHONE, project.customer_phone);
    let address = format_address(
        project.street.as_deref(),
        project.city.as_deref(),
        project.state.as_deref(),
        project.zip.as_deref(),
    );
    insert(&mut fields, pf::ADDRESS, Some(address));
    insert(&mut fields, pf::NOTES, project.note);
    insert(&mut fields, pf::MEASUREMENTS, project.measurements);
    insert(&mut fields, pf::ONE_CLICK_CODES, project.one_click_codes);

    Outgoing {
        local_id: project.id,
        name,
        fields,
    }
}
