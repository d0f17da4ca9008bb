//! Follow-up operations.
//!
//! A follow-up is reachable when its creator is inside the caller's scope
//! or its lead is visible to the caller. Unreachable and missing ids look
//! the same from outside.

use chrono::{DateTime, Utc};
use diesel::{Connection, PgConnection};
use log::info;
use std::collections::HashMap;
use uuid::Uuid;

use super::lifecycle::{derive_current_status, next_toggle_status, DueState, UPDATE_STATUS};
use super::repository;
use super::types::{
    parse_date, parse_upper_bound, CreateFollowupRequest, DateRange, FollowUp, FollowUpChangeset,
    FollowUpListItem, FollowUpLog, FollowUpWithLogs, LeadFollowUp, LeadRef, ListFollowupsQuery, NewFollowUp,
    NewFollowUpLog, UpdateFollowupRequest,
};
use crate::core::error::{CrmError, CrmResult, FieldError};
use crate::core::shared::enums::FollowupStatus;
use crate::leads::repository as lead_store;
use crate::security::{authorize, resolve_scope, CallerContext, Operation, Scope};
use crate::users::{staff_refs, user_names, user_ref};

fn unreachable_followup() -> CrmError {
    CrmError::NotFoundOrUnauthorized("Follow-up")
}

fn is_reachable(conn: &mut PgConnection, scope: &Scope, followup: &FollowUp) -> CrmResult<bool> {
    if scope.contains(followup.created_by_id) {
        return Ok(true);
    }
    Ok(lead_store::find_scoped(conn, followup.lead_id, scope)?.is_some())
}

fn reachable(conn: &mut PgConnection, scope: &Scope, followup_id: Uuid) -> CrmResult<FollowUp> {
    let followup = repository::find(conn, followup_id)?.ok_or_else(unreachable_followup)?;
    if is_reachable(conn, scope, &followup)? {
        Ok(followup)
    } else {
        Err(unreachable_followup())
    }
}

/// Locks the row for the rest of the transaction, then checks reach.
fn lock_reachable(conn: &mut PgConnection, scope: &Scope, followup_id: Uuid) -> CrmResult<FollowUp> {
    let followup = repository::lock(conn, followup_id)?.ok_or_else(unreachable_followup)?;
    if is_reachable(conn, scope, &followup)? {
        Ok(followup)
    } else {
        Err(unreachable_followup())
    }
}

fn with_logs(followup: FollowUp, logs: Vec<FollowUpLog>) -> FollowUpWithLogs {
    FollowUpWithLogs {
        current_status: derive_current_status(&logs),
        followup,
        logs,
    }
}

fn parse_required_date(raw: Option<&str>, errors: &mut Vec<FieldError>) -> Option<DateTime<Utc>> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => {
            errors.push(FieldError::required("nextFollowupDate"));
            None
        }
        Some(raw) => {
            let parsed = parse_date(raw);
            if parsed.is_none() {
                errors.push(FieldError::new("nextFollowupDate", "must be a valid date"));
            }
            parsed
        }
    }
}

pub fn create_followup(
    conn: &mut PgConnection,
    caller: &CallerContext,
    req: CreateFollowupRequest,
) -> CrmResult<FollowUpWithLogs> {
    authorize(caller, Operation::CreateFollowup)?;

    let mut errors = Vec::new();
    if req.lead_id.is_none() {
        errors.push(FieldError::required("leadId"));
    }
    let message = req
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    if message.is_none() {
        errors.push(FieldError::required("message"));
    }
    let next_date = parse_required_date(req.next_followup_date.as_deref(), &mut errors);

    let (Some(lead_id), Some(message), Some(next_followup_date)) = (req.lead_id, message, next_date)
    else {
        return Err(CrmError::Validation(errors));
    };

    let scope = resolve_scope(conn, caller)?;
    if lead_store::find_scoped(conn, lead_id, &scope)?.is_none() {
        return Err(CrmError::NotFoundOrUnauthorized("Lead"));
    }

    let now = Utc::now();
    let new_followup = NewFollowUp {
        id: Uuid::new_v4(),
        lead_id,
        message,
        next_followup_date,
        created_by_id: caller.user_id,
        created_at: now,
        updated_at: now,
    };
    let opening = NewFollowUpLog::entry(new_followup.id, FollowupStatus::Pending, caller.user_id);
    let (followup, log) = repository::insert_with_log(conn, &new_followup, &opening)?;

    info!(
        "Follow-up {} scheduled on lead {} by {}",
        followup.id, followup.lead_id, caller.user_id
    );
    Ok(with_logs(followup, vec![log]))
}

/// Unscoped: any authenticated caller may read a lead's follow-ups.
/// Unknown leads yield an empty list.
pub fn list_for_lead(
    conn: &mut PgConnection,
    caller: &CallerContext,
    lead_id: Uuid,
) -> CrmResult<Vec<LeadFollowUp>> {
    authorize(caller, Operation::ListFollowupsForLead)?;
    let followups = repository::list_for_lead(conn, lead_id)?;
    let ids: Vec<Uuid> = followups.iter().map(|f| f.id).collect();
    let creator_ids: Vec<Uuid> = followups.iter().map(|f| f.created_by_id).collect();
    let mut logs = repository::logs_for(conn, &ids)?;
    let creators = staff_refs(conn, &creator_ids)?;

    Ok(followups
        .into_iter()
        .map(|f| {
            let history = logs.remove(&f.id).unwrap_or_default();
            LeadFollowUp {
                created_by: creators.get(&f.created_by_id).cloned(),
                current_status: derive_current_status(&history),
                logs: history,
                followup: f,
            }
        })
        .collect())
}

fn date_range(query: &ListFollowupsQuery) -> CrmResult<DateRange> {
    let mut errors = Vec::new();
    let from = query.from.as_deref().and_then(|raw| {
        let parsed = parse_date(raw);
        if parsed.is_none() {
            errors.push(FieldError::new("from", "must be a valid date"));
        }
        parsed
    });
    let to = query.to.as_deref().and_then(|raw| {
        let parsed = parse_upper_bound(raw);
        if parsed.is_none() {
            errors.push(FieldError::new("to", "must be a valid date"));
        }
        parsed
    });
    if !errors.is_empty() {
        return Err(CrmError::Validation(errors));
    }
    Ok(DateRange { from, to })
}

pub fn list_all(
    conn: &mut PgConnection,
    caller: &CallerContext,
    query: &ListFollowupsQuery,
) -> CrmResult<Vec<FollowUpListItem>> {
    authorize(caller, Operation::ListAllFollowups)?;
    let range = date_range(query)?;
    let scope = resolve_scope(conn, caller)?;

    let followups = repository::list_scoped(conn, &scope, query.agent_id, range)?;
    let ids: Vec<Uuid> = followups.iter().map(|f| f.id).collect();
    let lead_ids: Vec<Uuid> = followups.iter().map(|f| f.lead_id).collect();
    let creator_ids: Vec<Uuid> = followups.iter().map(|f| f.created_by_id).collect();

    let mut logs = repository::logs_for(conn, &ids)?;
    let lead_names = lead_store::lead_names(conn, &lead_ids)?;
    let creators = user_names(conn, &creator_ids)?;
    let now = Utc::now();

    Ok(followups
        .into_iter()
        .filter_map(|f| {
            let history = logs.remove(&f.id).unwrap_or_default();
            let current_status = derive_current_status(&history);
            if query.status.is_some_and(|wanted| wanted != current_status) {
                return None;
            }
            Some(FollowUpListItem {
                lead: LeadRef {
                    id: f.lead_id,
                    name: lead_names.get(&f.lead_id).cloned().unwrap_or_default(),
                },
                created_by: user_ref(&creators, f.created_by_id),
                current_status,
                due: DueState::classify(f.next_followup_date, now),
                logs: history,
                followup: f,
            })
        })
        .collect())
}

pub fn followup_logs(
    conn: &mut PgConnection,
    caller: &CallerContext,
    followup_id: Uuid,
) -> CrmResult<Vec<FollowUpLog>> {
    authorize(caller, Operation::FollowupLogs)?;
    let scope = resolve_scope(conn, caller)?;
    reachable(conn, &scope, followup_id)?;
    repository::logs_of(conn, followup_id)
}

pub fn toggle_status(
    conn: &mut PgConnection,
    caller: &CallerContext,
    followup_id: Uuid,
) -> CrmResult<FollowUpLog> {
    authorize(caller, Operation::ToggleFollowupStatus)?;
    let scope = resolve_scope(conn, caller)?;

    let entry = conn.transaction::<_, CrmError, _>(|conn| {
        lock_reachable(conn, &scope, followup_id)?;
        let current = repository::latest_log(conn, followup_id)?
            .map(|log| log.status)
            .unwrap_or_default();
        let next = next_toggle_status(current);
        repository::append_log(conn, &NewFollowUpLog::entry(followup_id, next, caller.user_id))
    })?;

    info!(
        "Follow-up {} toggled to {} by {}",
        followup_id, entry.status, caller.user_id
    );
    Ok(entry)
}

pub fn update_followup(
    conn: &mut PgConnection,
    caller: &CallerContext,
    followup_id: Uuid,
    req: UpdateFollowupRequest,
) -> CrmResult<FollowUpWithLogs> {
    authorize(caller, Operation::UpdateFollowup)?;

    let mut errors = Vec::new();
    if req.message.is_none() && req.next_followup_date.is_none() {
        return Err(CrmError::invalid("body", "no updatable fields supplied"));
    }
    let message = match req.message.as_deref().map(str::trim) {
        Some("") => {
            errors.push(FieldError::new("message", "must not be blank"));
            None
        }
        other => other.map(str::to_string),
    };
    let next_followup_date = match req.next_followup_date.as_deref() {
        Some(raw) => parse_required_date(Some(raw), &mut errors),
        None => None,
    };
    if !errors.is_empty() {
        return Err(CrmError::Validation(errors));
    }

    let scope = resolve_scope(conn, caller)?;
    let updated = conn.transaction::<_, CrmError, _>(|conn| {
        lock_reachable(conn, &scope, followup_id)?;
        let followup = repository::update(
            conn,
            followup_id,
            FollowUpChangeset {
                message,
                next_followup_date,
                ..Default::default()
            },
        )?;
        repository::append_log(
            conn,
            &NewFollowUpLog::entry(followup_id, UPDATE_STATUS, caller.user_id),
        )?;
        let logs = repository::logs_of(conn, followup_id)?;
        Ok(with_logs(followup, logs))
    })?;

    info!("Follow-up {} rescheduled by {}", followup_id, caller.user_id);
    Ok(updated)
}

pub fn delete_followup(conn: &mut PgConnection, caller: &CallerContext, followup_id: Uuid) -> CrmResult<()> {
    authorize(caller, Operation::DeleteFollowup)?;
    let scope = resolve_scope(conn, caller)?;
    reachable(conn, &scope, followup_id)?;
    if repository::delete(conn, followup_id)? == 0 {
        return Err(unreachable_followup());
    }
    info!("Follow-up {} deleted by {}", followup_id, caller.user_id);
    Ok(())
}

/// Pending follow-ups created within `scope`, split into (overdue, upcoming).
pub fn pending_due_counts(conn: &mut PgConnection, scope: &Scope) -> CrmResult<(i64, i64)> {
    let followups = repository::list_scoped(conn, scope, None, DateRange::default())?;
    let ids: Vec<Uuid> = followups.iter().map(|f| f.id).collect();
    let logs: HashMap<Uuid, Vec<FollowUpLog>> = repository::logs_for(conn, &ids)?;
    let now = Utc::now();

    let mut overdue = 0;
    let mut upcoming = 0;
    for f in &followups {
        let status = logs
            .get(&f.id)
            .map(|history| derive_current_status(history))
            .unwrap_or_default();
        if status != FollowupStatus::Pending {
            continue;
        }
        match DueState::classify(f.next_followup_date, now) {
            DueState::Overdue => overdue += 1,
            DueState::Upcoming => upcoming += 1,
        }
    }
    Ok((overdue, upcoming))
}
