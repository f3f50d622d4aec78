// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bidirectional column-to-field mapping.
//!
//! A [`ColumnMap`] is an ordered table of `(column_id, field)` pairs. Several
//! columns may feed the same field:
//!
//! - board → store: the first non-empty column in declaration order wins
//! - store → board: the first declared column for a field is written
//!
//! Columns not in the table are preserved under their raw column id so the
//! caller can stash them in a metadata object.

mod address;

use std::collections::BTreeMap;

pub use address::{Address, format_address, parse_address};

use crate::models::BoardItem;

/// Result of mapping one board item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedItem {
    /// External item id.
    pub external_id: String,
    /// Item name.
    pub name: String,
    /// Mapped field values, empty text excluded.
    pub fields: BTreeMap<String, String>,
    /// Non-empty values of unmapped columns keyed by column id.
    pub unmapped: BTreeMap<String, String>,
}

impl MappedItem {
    /// Value of a mapped field.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Owned value of a mapped field.
    pub fn owned(&self, field: &str) -> Option<String> {
        self.fields.get(field).cloned()
    }
}

/// Ordered column ↔ field table.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    entries: Vec<(String, String)>,
}

impl ColumnMap {
    /// Build a map from `(column_id, field)` pairs in precedence order.
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(column, field)| (column.to_string(), field.to_string()))
                .collect(),
        }
    }

    /// Column ids to request from the board, in declaration order.
    pub fn column_ids(&self) -> Vec<String> {
        self.entries.iter().map(|(c, _)| c.clone()).collect()
    }

    /// Field a column maps to.
    pub fn field_for(&self, column_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(c, _)| c == column_id)
            .map(|(_, f)| f.as_str())
    }

    /// Column written for a field on push (first declared).
    pub fn column_for(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, f)| f == field)
            .map(|(c, _)| c.as_str())
    }

    /// Map a board item to named fields.
    pub fn map_item(&self, item: &BoardItem) -> MappedItem {
        let mut fields = BTreeMap::new();
        for (column, field) in &self.entries {
            if fields.contains_key(field) {
                continue;
            }
            if let Some(text) = item.column_text(column) {
                fields.insert(field.clone(), text.trim().to_string());
            }
        }

        let unmapped = item
            .column_values
            .iter()
            .filter(|c| self.field_for(&c.id).is_none())
            .filter_map(|c| {
                c.text
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(|t| (c.id.clone(), t.to_string()))
            })
            .collect();

        MappedItem {
            external_id: item.id.clone(),
            name: item.name.trim().to_string(),
            fields,
            unmapped,
        }
    }

    /// Map named fields back to `(column_id, value)` pairs.
    ///
    /// Fields the map does not know and empty values are dropped. Output
    /// follows declaration order.
    pub fn to_columns(&self, fields: &BTreeMap<String, String>) -> Vec<(String, String)> {
        let mut emitted: Vec<&str> = Vec::new();
        let mut columns = Vec::new();
        for (column, field) in &self.entries {
            if emitted.contains(&field.as_str()) {
                continue;
            }
            emitted.push(field);
            if let Some(value) = fields.get(field).filter(|v| !v.trim().is_empty()) {
                columns.push((column.clone(), value.clone()));
            }
        }
        columns
    }

    /// Master project board.
    pub fn projects() -> Self {
        Self::new(PROJECT_COLUMNS)
    }

    /// Sales staff board.
    pub fn users() -> Self {
        Self::new(USER_COLUMNS)
    }
}

/// Field names produced by [`ColumnMap::projects`].
pub mod project_fields {
    pub const STATUS: &str = "status";
    pub const LINK: &str = "link";
    pub const JOB_NAME: &str = "job_name";
    pub const DESCRIPTION: &str = "description";
    pub const COMPANY_CAM_LINK: &str = "company_cam_link";
    pub const ESTIMATED_VALUE: &str = "estimated_value";
    pub const TOTAL_PAYMENT: &str = "total_payment";
    pub const CUSTOMER_NAME: &str = "customer_name";
    pub const EMAIL: &str = "email";
    pub const ADDRESS: &str = "address";
    pub const NOTES: &str = "notes";
    pub const PHONE: &str = "phone";
    pub const TEAM_NAME: &str = "team_name";
    pub const MEASUREMENTS: &str = "measurements";
    pub const ONE_CLICK_CODES: &str = "one_click_codes";
}

/// Field names produced by [`ColumnMap::users`].
pub mod user_fields {
    pub const FIRST_NAME: &str = "first_name";
    pub const LAST_NAME: &str = "last_name";
    pub const EMAIL: &str = "email";
    pub const TEAM: &str = "team";
    pub const IDENTIFICATION_FILES: &str = "identification_files";
    pub const ONBOARDING_FILES: &str = "onboarding_files";
    pub const SHIRT_SIZE: &str = "shirt_size";
    pub const PHONE: &str = "phone";
    pub const ADDRESS: &str = "address";
    pub const CITY: &str = "city";
    pub const STATE: &str = "state";
    pub const ZIP: &str = "zip";
}

const PROJECT_COLUMNS: &[(&str, &str)] = &[
    ("text95__1", project_fields::STATUS),
    ("link__1", project_fields::LINK),
    ("text01__1", project_fields::JOB_NAME),
    ("text40__1", project_fields::DESCRIPTION),
    ("text_7__1", project_fields::COMPANY_CAM_LINK),
    ("numbers0", project_fields::ESTIMATED_VALUE),
    ("qb_total_payments__1", project_fields::TOTAL_PAYMENT),
    // customer
    ("text65__1", project_fields::CUSTOMER_NAME),
    ("email4__1", project_fields::EMAIL),
    ("dup__of_job_address0__1", project_fields::ADDRESS),
    ("text43__1", project_fields::NOTES),
    ("phone_1__1", project_fields::PHONE),
    ("job_division___1__1", project_fields::TEAM_NAME),
    // contacts
    ("partner_name__1", "partner_name"),
    ("partner_email__1", "partner_email"),
    ("partner_phone____1", "partner_phone"),
    ("text19__1", "pm_name"),
    ("phone_13__1", "pm_phone"),
    ("email6__1", "pm_email"),
    ("job_est_1_name__1", "estimator_name"),
    ("phone_10__1", "estimator_phone"),
    ("email0__1", "estimator_email"),
    ("dup__of_text6__1", "superintendent_name"),
    ("dup__of_phone_1__1", "superintendent_phone"),
    ("dup__of_email__1", "superintendent_email"),
    ("text22__1", "sales_rep_first_name"),
    ("text49__1", "sales_rep_last_name"),
    ("sales_rep_phone____1", "sales_rep_phone"),
    ("email5__1", "sales_rep_email"),
    ("jp_pa_law_name__1", "pa_law_name"),
    ("jp_pa_law_phone__1", "pa_law_phone"),
    ("jp_pa_law_email__1", "pa_law_email"),
    // claim and insurance
    ("claim_number__1", "claim_number"),
    ("dup__of_text0__1", "policy_number"),
    ("text31__1", "insurance_company_name"),
    ("phone_132__1", "insurance_company_phone"),
    ("email05__1", "insurance_company_email"),
    ("phone_17__1", "adjuster_phone"),
    ("email57__1", "adjuster_email"),
    ("date_19__1", "date_of_loss"),
    // property
    ("files9__1", project_fields::MEASUREMENTS),
    ("files66__1", project_fields::ONE_CLICK_CODES),
];

const USER_COLUMNS: &[(&str, &str)] = &[
    ("text25", user_fields::FIRST_NAME),
    ("text1", user_fields::LAST_NAME),
    // Both email columns feed `email`; the first is preferred
    ("email7", user_fields::EMAIL),
    ("email__1", user_fields::EMAIL),
    ("status_13", user_fields::TEAM),
    ("files3", user_fields::IDENTIFICATION_FILES),
    ("files_1", user_fields::ONBOARDING_FILES),
    ("text6", user_fields::SHIRT_SIZE),
    ("phone", user_fields::PHONE),
    ("text", user_fields::ADDRESS),
    ("text2", user_fields::CITY),
    ("text5", user_fields::STATE),
    ("text57", user_fields::ZIP),
];
