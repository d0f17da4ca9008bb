use diesel::PgConnection;
use serde::Serialize;

use super::repository;
use super::types::LeadFilters;
use crate::core::error::CrmResult;
use crate::core::shared::enums::LeadStatus;
use crate::followups::service::pending_due_counts;
use crate::security::{authorize, resolve_scope, CallerContext, Operation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FunnelStage {
    pub status: LeadStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSummary {
    pub total_leads: i64,
    pub assigned_to_me: i64,
    pub funnel: Vec<FunnelStage>,
    pub overdue_followups: i64,
    pub upcoming_followups: i64,
}

/// Dashboard counts over everything the caller can see.
pub fn lead_summary(conn: &mut PgConnection, caller: &CallerContext) -> CrmResult<LeadSummary> {
    authorize(caller, Operation::LeadSummary)?;
    let scope = resolve_scope(conn, caller)?;

    let total_leads = repository::count_leads(conn, &scope, &LeadFilters::default())?;
    let assigned_to_me = repository::count_assigned_to(conn, caller.user_id)?;

    let mut funnel = Vec::with_capacity(LeadStatus::ALL.len());
    for status in LeadStatus::ALL {
        let filters = LeadFilters {
            status: Some(status),
            ..Default::default()
        };
        funnel.push(FunnelStage {
            status,
            count: repository::count_leads(conn, &scope, &filters)?,
        });
    }

    let (overdue_followups, upcoming_followups) = pending_due_counts(conn, &scope)?;

    Ok(LeadSummary {
        total_leads,
        assigned_to_me,
        funnel,
        overdue_followups,
        upcoming_followups,
    })
}
