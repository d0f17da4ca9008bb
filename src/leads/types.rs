use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::core::config::LeadSettings;
use crate::core::error::{CrmError, CrmResult, FieldError};
use crate::core::shared::enums::LeadStatus;
use crate::core::shared::schema::leads;
use crate::core::shared::utils::{empty_string_as_none, nullable};
use crate::users::StaffRef;

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = leads)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub phone_key: String,
    pub email: Option<String>,
    pub country: String,
    pub city: Option<String>,
    pub area_interested_in: Option<String>,
    pub plan_interested_in: Option<String>,
    pub property_type: Option<String>,
    pub project_id: Option<Uuid>,
    pub budget: i64,
    pub plan_to_purchase: Option<String>,
    pub lead_source: Option<String>,
    pub notes: Option<String>,
    pub status: LeadStatus,
    pub assigned_to_id: Uuid,
    pub created_by_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = leads)]
pub struct NewLead {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub phone_key: String,
    pub email: Option<String>,
    pub country: String,
    pub city: Option<String>,
    pub area_interested_in: Option<String>,
    pub plan_interested_in: Option<String>,
    pub property_type: Option<String>,
    pub project_id: Option<Uuid>,
    pub budget: i64,
    pub plan_to_purchase: Option<String>,
    pub lead_source: Option<String>,
    pub notes: Option<String>,
    pub status: LeadStatus,
    pub assigned_to_id: Uuid,
    pub created_by_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Columns an update may touch. `None` leaves the column unchanged; on the
/// nullable columns `Some(None)` writes NULL.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = leads)]
pub struct LeadChangeset {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub phone_key: Option<String>,
    pub email: Option<Option<String>>,
    pub country: Option<String>,
    pub city: Option<Option<String>>,
    pub area_interested_in: Option<Option<String>>,
    pub plan_interested_in: Option<Option<String>>,
    pub property_type: Option<Option<String>>,
    pub project_id: Option<Option<Uuid>>,
    pub budget: Option<i64>,
    pub plan_to_purchase: Option<Option<String>>,
    pub lead_source: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub status: Option<LeadStatus>,
    pub assigned_to_id: Option<Uuid>,
    pub updated_at: Option<DateTime<Utc>>,
}

// ============================================================================
// REQUESTS
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub area_interested_in: Option<String>,
    pub plan_interested_in: Option<String>,
    pub property_type: Option<String>,
    pub project_id: Option<Uuid>,
    pub budget: Option<Value>,
    pub plan_to_purchase: Option<String>,
    pub lead_source: Option<String>,
    pub notes: Option<String>,
    pub status: Option<LeadStatus>,
    pub assigned_to_id: Option<Uuid>,
}

/// Allowlisted lead patch. Any other key, `assignedToId` included, is rejected.
/// Optional fields are cleared by `null` or, for text, by a blank string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateLeadRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub email: Option<Option<String>>,
    pub country: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub city: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub area_interested_in: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub plan_interested_in: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub property_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub project_id: Option<Option<Uuid>>,
    pub budget: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub plan_to_purchase: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub lead_source: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
    pub status: Option<LeadStatus>,
}

impl UpdateLeadRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.country.is_none()
            && self.city.is_none()
            && self.area_interested_in.is_none()
            && self.plan_interested_in.is_none()
            && self.property_type.is_none()
            && self.project_id.is_none()
            && self.budget.is_none()
            && self.plan_to_purchase.is_none()
            && self.lead_source.is_none()
            && self.notes.is_none()
            && self.status.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignLeadRequest {
    #[serde(alias = "assignedToId")]
    pub new_assignee_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLeadsQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub status: Option<LeadStatusParam>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub project_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub agent_id: Option<Uuid>,
}

/// `LeadStatus` parsed from a query-string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadStatusParam(pub LeadStatus);

impl std::str::FromStr for LeadStatusParam {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadFilters {
    pub search: Option<String>,
    pub status: Option<LeadStatus>,
    pub project_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
}

impl From<&ListLeadsQuery> for LeadFilters {
    fn from(query: &ListLeadsQuery) -> Self {
        Self {
            search: query
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            status: query.status.map(|s| s.0),
            project_id: query.project_id,
            agent_id: query.agent_id,
        }
    }
}

// ============================================================================
// PAGINATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// Pages start at 1. A limit above the configured maximum is clamped.
    pub fn resolve(page: Option<i64>, limit: Option<i64>, settings: &LeadSettings) -> CrmResult<Self> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(settings.default_page_size);

        let mut errors = Vec::new();
        if page < 1 {
            errors.push(FieldError::new("page", "must be at least 1"));
        }
        if limit <= 0 {
            errors.push(FieldError::new("limit", "must be greater than 0"));
        }
        if !errors.is_empty() {
            return Err(CrmError::Validation(errors));
        }

        Ok(Self {
            page,
            limit: limit.min(settings.max_page_size.max(1)),
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total_count: i64) -> i64 {
        if total_count <= 0 {
            0
        } else {
            (total_count + self.limit - 1) / self.limit
        }
    }
}

// ============================================================================
// RESPONSES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadListItem {
    #[serde(flatten)]
    pub lead: Lead,
    pub agent_name: String,
    pub project_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPage {
    pub items: Vec<LeadListItem>,
    pub total_count: i64,
    pub total_pages: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadDetail {
    #[serde(flatten)]
    pub lead: Lead,
    pub assigned_to: Option<StaffRef>,
    pub project: Option<ProjectRef>,
}

/// Result of an intake attempt. A duplicate phone is a business signal,
/// reported as `{exists: true, message}` rather than an error.
#[derive(Debug, Clone)]
pub enum CreateLeadOutcome {
    Created(Lead),
    Exists { message: String, existing_id: Uuid },
}

pub fn duplicate_message(agent_name: Option<&str>) -> String {
    format!(
        "Lead already exists with Agent {}",
        agent_name.filter(|n| !n.is_empty()).unwrap_or("Unknown")
    )
}

/// Budget from loosely typed input; anything unparseable becomes 0.
pub fn parse_budget(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => parse_budget_text(s),
        _ => 0,
    }
}

pub fn parse_budget_text(raw: &str) -> i64 {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<i64>()
        .ok()
        .or_else(|| {
            cleaned
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| f as i64)
        })
        .unwrap_or(0)
}

/// Trims a text field; blank becomes `None`.
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
