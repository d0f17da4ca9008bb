//! Bulk lead import from already-parsed rows.
//!
//! Rows are validated one by one and failures are collected per row; the
//! rows that pass are written together in one transaction.

use chrono::Utc;
use diesel::{Connection, PgConnection};
use log::info;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::phone::normalize_phone;
use super::repository;
use super::types::{duplicate_message, parse_budget_text, NewLead};
use crate::core::error::{CrmError, CrmResult};
use crate::core::shared::enums::LeadStatus;
use crate::projects;
use crate::security::{authorize, CallerContext, Operation};
use crate::users::find_user;

/// Spreadsheet rows are 1-indexed and the first row is the header.
const ROW_OFFSET: usize = 2;

/// Accepts strings, numbers and booleans; blank or null becomes `None`.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRow {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub area_interested_in: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub plan_interested_in: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub property_type: Option<String>,
    #[serde(default, alias = "projectName", deserialize_with = "lenient_text")]
    pub project: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub budget: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub plan_to_purchase: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub lead_source: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub notes: Option<String>,
}

/// Either a bare array of rows or `{"rows": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ImportPayload {
    Rows(Vec<ImportRow>),
    Wrapped { rows: Vec<ImportRow> },
}

impl ImportPayload {
    pub fn into_rows(self) -> Vec<ImportRow> {
        match self {
            Self::Rows(rows) | Self::Wrapped { rows } => rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRowError {
    pub row: usize,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub message: String,
    pub imported: usize,
    pub errors: Vec<ImportRowError>,
}

pub fn row_number(index: usize) -> usize {
    index + ROW_OFFSET
}

/// Checks presence of every required column and returns the phone key.
pub fn validate_row(row: &ImportRow) -> Result<String, String> {
    let required: [(&str, &Option<String>); 9] = [
        ("name", &row.name),
        ("phone", &row.phone),
        ("country", &row.country),
        ("city", &row.city),
        ("areaInterestedIn", &row.area_interested_in),
        ("planInterestedIn", &row.plan_interested_in),
        ("propertyType", &row.property_type),
        ("planToPurchase", &row.plan_to_purchase),
        ("leadSource", &row.lead_source),
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, value)| value.is_none())
        .map(|(field, _)| *field)
        .collect();
    if !missing.is_empty() {
        return Err(format!("Missing required fields: {}", missing.join(", ")));
    }

    let key = row.phone.as_deref().map(normalize_phone).unwrap_or_default();
    if key.is_empty() {
        return Err("Phone number must contain digits".to_string());
    }
    Ok(key)
}

fn new_lead_from(row: ImportRow, phone_key: String, project_id: Option<Uuid>, owner: Uuid) -> NewLead {
    let now = Utc::now();
    NewLead {
        id: Uuid::new_v4(),
        name: row.name.unwrap_or_default(),
        phone: row.phone.unwrap_or_default(),
        phone_key,
        email: row.email,
        country: row.country.unwrap_or_default(),
        city: row.city,
        area_interested_in: row.area_interested_in,
        plan_interested_in: row.plan_interested_in,
        property_type: row.property_type,
        project_id,
        budget: row.budget.as_deref().map(parse_budget_text).unwrap_or(0).max(0),
        plan_to_purchase: row.plan_to_purchase,
        lead_source: row.lead_source,
        notes: Some(row.notes.unwrap_or_default()),
        status: LeadStatus::New,
        assigned_to_id: owner,
        created_by_id: owner,
        created_at: now,
        updated_at: now,
    }
}

pub fn import_leads(
    conn: &mut PgConnection,
    caller: &CallerContext,
    rows: Vec<ImportRow>,
) -> CrmResult<ImportReport> {
    authorize(caller, Operation::ImportLeads)?;
    let total = rows.len();

    let (imported, mut errors) = conn.transaction::<_, CrmError, _>(|conn| {
        let mut errors = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut project_ids: HashMap<String, Uuid> = HashMap::new();
        let mut pending: Vec<(usize, NewLead)> = Vec::new();

        for (index, row) in rows.into_iter().enumerate() {
            let row_no = row_number(index);
            let key = match validate_row(&row) {
                Ok(key) => key,
                Err(error) => {
                    errors.push(ImportRowError { row: row_no, error });
                    continue;
                }
            };

            if let Some(first) = seen.get(&key) {
                errors.push(ImportRowError {
                    row: row_no,
                    error: format!("Duplicate phone number, same as row {first}"),
                });
                continue;
            }
            if let Some(existing) = repository::find_by_phone_key(conn, &key, None)? {
                let agent = find_user(conn, existing.assigned_to_id)?;
                errors.push(ImportRowError {
                    row: row_no,
                    error: duplicate_message(agent.as_ref().map(|a| a.name.as_str())),
                });
                continue;
            }

            let project_id = match row.project.as_deref() {
                Some(name) => match project_ids.get(name) {
                    Some(id) => Some(*id),
                    None => {
                        let id = projects::resolve_or_create(conn, name)?;
                        project_ids.insert(name.to_string(), id);
                        Some(id)
                    }
                },
                None => None,
            };

            seen.insert(key.clone(), row_no);
            pending.push((row_no, new_lead_from(row, key, project_id, caller.user_id)));
        }

        let batch: Vec<NewLead> = pending.iter().map(|(_, lead)| lead.clone()).collect();
        let inserted: HashSet<Uuid> = repository::insert_batch_skip_taken(conn, &batch)?
            .into_iter()
            .collect();

        for (row_no, lead) in &pending {
            if !inserted.contains(&lead.id) {
                errors.push(ImportRowError {
                    row: *row_no,
                    error: "Lead already exists (added concurrently)".to_string(),
                });
            }
        }
        Ok((inserted.len(), errors))
    })?;

    errors.sort_by_key(|e| e.row);
    info!(
        "Import by {}: {} of {} rows imported, {} rejected",
        caller.user_id,
        imported,
        total,
        errors.len()
    );

    Ok(ImportReport {
        message: format!("Imported {imported} of {total} leads"),
        imported,
        errors,
    })
}
