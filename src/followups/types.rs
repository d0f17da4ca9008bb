use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lifecycle::DueState;
use crate::core::shared::enums::FollowupStatus;
use crate::core::shared::schema::{follow_up_logs, follow_ups};
use crate::core::shared::utils::empty_string_as_none;
use crate::users::{StaffRef, UserRef};

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = follow_ups)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct FollowUp {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub message: String,
    pub next_followup_date: DateTime<Utc>,
    pub created_by_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = follow_ups)]
pub struct NewFollowUp {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub message: String,
    pub next_followup_date: DateTime<Utc>,
    pub created_by_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = follow_ups)]
pub struct FollowUpChangeset {
    pub message: Option<String>,
    pub next_followup_date: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One append-only audit entry. `seq` is assigned by the store and gives
/// the append order; `logged_at` is informational.
#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable)]
#[diesel(table_name = follow_up_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct FollowUpLog {
    pub id: Uuid,
    pub followup_id: Uuid,
    pub status: FollowupStatus,
    pub updated_by_id: Uuid,
    pub logged_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub seq: i64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = follow_up_logs)]
pub struct NewFollowUpLog {
    pub id: Uuid,
    pub followup_id: Uuid,
    pub status: FollowupStatus,
    pub updated_by_id: Uuid,
}

impl NewFollowUpLog {
    pub fn entry(followup_id: Uuid, status: FollowupStatus, updated_by_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            followup_id,
            status,
            updated_by_id,
        }
    }
}

// ============================================================================
// REQUESTS
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFollowupRequest {
    pub lead_id: Option<Uuid>,
    pub message: Option<String>,
    pub next_followup_date: Option<String>,
}

/// Only the message and the next date of a follow-up can be patched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateFollowupRequest {
    pub message: Option<String>,
    pub next_followup_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFollowupsQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub status: Option<FollowupStatus>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub from: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub to: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub agent_id: Option<Uuid>,
}

/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` (read as UTC) and `YYYY-MM-DD`
/// (midnight UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// Upper range bound. A bare date covers that whole day.
pub fn parse_upper_bound(raw: &str) -> Option<DateTime<Utc>> {
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(day) => day
            .and_hms_micro_opt(23, 59, 59, 999_999)
            .map(|end| end.and_utc()),
        Err(_) => parse_date(raw),
    }
}

/// Inclusive bounds on `nextFollowupDate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

// ============================================================================
// RESPONSES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpWithLogs {
    #[serde(flatten)]
    pub followup: FollowUp,
    pub current_status: FollowupStatus,
    pub logs: Vec<FollowUpLog>,
}

/// Entry of a lead's follow-up history, with its author expanded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadFollowUp {
    #[serde(flatten)]
    pub followup: FollowUp,
    pub created_by: Option<StaffRef>,
    pub current_status: FollowupStatus,
    pub logs: Vec<FollowUpLog>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpListItem {
    #[serde(flatten)]
    pub followup: FollowUp,
    pub lead: LeadRef,
    pub created_by: UserRef,
    pub current_status: FollowupStatus,
    pub due: DueState,
    pub logs: Vec<FollowUpLog>,
}

/// `{id, name}` of the lead a follow-up targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadRef {
    pub id: Uuid,
    pub name: String,
}
