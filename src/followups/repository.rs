use chrono::Utc;
use diesel::prelude::*;
use std::collections::HashMap;
use uuid::Uuid;

use super::types::{DateRange, FollowUp, FollowUpChangeset, FollowUpLog, NewFollowUp, NewFollowUpLog};
use crate::core::error::{CrmError, CrmResult};
use crate::core::shared::schema::{follow_up_logs, follow_ups};
use crate::security::Scope;

/// Writes the follow-up and its opening log entry atomically.
pub fn insert_with_log(
    conn: &mut PgConnection,
    new_followup: &NewFollowUp,
    opening: &NewFollowUpLog,
) -> CrmResult<(FollowUp, FollowUpLog)> {
    conn.transaction::<_, CrmError, _>(|conn| {
        let followup = diesel::insert_into(follow_ups::table)
            .values(new_followup)
            .returning(FollowUp::as_returning())
            .get_result(conn)?;
        let log = append_log(conn, opening)?;
        Ok((followup, log))
    })
}

pub fn find(conn: &mut PgConnection, followup_id: Uuid) -> CrmResult<Option<FollowUp>> {
    Ok(follow_ups::table
        .find(followup_id)
        .select(FollowUp::as_select())
        .first(conn)
        .optional()?)
}

/// Row-locks the follow-up until the surrounding transaction ends, so
/// concurrent status changes read the latest entry in turn.
pub fn lock(conn: &mut PgConnection, followup_id: Uuid) -> CrmResult<Option<FollowUp>> {
    Ok(follow_ups::table
        .find(followup_id)
        .select(FollowUp::as_select())
        .for_update()
        .get_result(conn)
        .optional()?)
}

pub fn append_log(conn: &mut PgConnection, entry: &NewFollowUpLog) -> CrmResult<FollowUpLog> {
    Ok(diesel::insert_into(follow_up_logs::table)
        .values(entry)
        .returning(FollowUpLog::as_returning())
        .get_result(conn)?)
}

pub fn latest_log(conn: &mut PgConnection, followup_id: Uuid) -> CrmResult<Option<FollowUpLog>> {
    Ok(follow_up_logs::table
        .filter(follow_up_logs::followup_id.eq(followup_id))
        .select(FollowUpLog::as_select())
        .order(follow_up_logs::seq.desc())
        .first(conn)
        .optional()?)
}

pub fn logs_of(conn: &mut PgConnection, followup_id: Uuid) -> CrmResult<Vec<FollowUpLog>> {
    Ok(follow_up_logs::table
        .filter(follow_up_logs::followup_id.eq(followup_id))
        .select(FollowUpLog::as_select())
        .order(follow_up_logs::seq.asc())
        .load(conn)?)
}

/// Log histories keyed by follow-up id, oldest entry first.
pub fn logs_for(conn: &mut PgConnection, ids: &[Uuid]) -> CrmResult<HashMap<Uuid, Vec<FollowUpLog>>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<FollowUpLog> = follow_up_logs::table
        .filter(follow_up_logs::followup_id.eq_any(ids))
        .select(FollowUpLog::as_select())
        .order(follow_up_logs::seq.asc())
        .load(conn)?;

    let mut grouped: HashMap<Uuid, Vec<FollowUpLog>> = HashMap::new();
    for log in rows {
        grouped.entry(log.followup_id).or_default().push(log);
    }
    Ok(grouped)
}

pub fn list_for_lead(conn: &mut PgConnection, lead_id: Uuid) -> CrmResult<Vec<FollowUp>> {
    Ok(follow_ups::table
        .filter(follow_ups::lead_id.eq(lead_id))
        .select(FollowUp::as_select())
        .order((follow_ups::created_at.desc(), follow_ups::id.desc()))
        .load(conn)?)
}

/// Follow-ups whose creator is in scope, soonest first.
pub fn list_scoped(
    conn: &mut PgConnection,
    scope: &Scope,
    agent_id: Option<Uuid>,
    range: DateRange,
) -> CrmResult<Vec<FollowUp>> {
    let mut query = follow_ups::table.select(FollowUp::as_select()).into_boxed();
    if let Some(ids) = scope.owner_ids() {
        query = query.filter(follow_ups::created_by_id.eq_any(ids));
    }
    if let Some(agent_id) = agent_id {
        query = query.filter(follow_ups::created_by_id.eq(agent_id));
    }
    if let Some(from) = range.from {
        query = query.filter(follow_ups::next_followup_date.ge(from));
    }
    if let Some(to) = range.to {
        query = query.filter(follow_ups::next_followup_date.le(to));
    }
    Ok(query
        .order((follow_ups::next_followup_date.asc(), follow_ups::id.asc()))
        .load(conn)?)
}

pub fn update(
    conn: &mut PgConnection,
    followup_id: Uuid,
    mut changes: FollowUpChangeset,
) -> CrmResult<FollowUp> {
    changes.updated_at = Some(Utc::now());
    Ok(diesel::update(follow_ups::table.find(followup_id))
        .set(&changes)
        .returning(FollowUp::as_returning())
        .get_result(conn)?)
}

pub fn delete(conn: &mut PgConnection, followup_id: Uuid) -> CrmResult<usize> {
    Ok(diesel::delete(follow_ups::table.find(followup_id)).execute(conn)?)
}
