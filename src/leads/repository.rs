use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::collections::HashMap;
use uuid::Uuid;

use super::types::{Lead, LeadChangeset, LeadFilters, NewLead, Pagination};
use crate::core::error::CrmResult;
use crate::core::shared::schema::{leads, projects};
use crate::core::shared::utils::escape_like;
use crate::security::Scope;

/// Restricts a lead query to the scope and the caller-supplied filters.
fn apply_filters<'a, ST: 'a>(
    mut query: leads::BoxedQuery<'a, Pg, ST>,
    scope: &Scope,
    filters: &LeadFilters,
) -> leads::BoxedQuery<'a, Pg, ST> {
    if let Some(ids) = scope.owner_ids() {
        query = query.filter(
            leads::assigned_to_id
                .eq_any(ids.clone())
                .or(leads::created_by_id.eq_any(ids)),
        );
    }
    if let Some(search) = &filters.search {
        query = query.filter(leads::name.ilike(format!("%{}%", escape_like(search))));
    }
    if let Some(status) = filters.status {
        query = query.filter(leads::status.eq(status));
    }
    if let Some(project_id) = filters.project_id {
        query = query.filter(leads::project_id.eq(project_id));
    }
    if let Some(agent_id) = filters.agent_id {
        query = query.filter(leads::assigned_to_id.eq(agent_id));
    }
    query
}

pub fn count_leads(conn: &mut PgConnection, scope: &Scope, filters: &LeadFilters) -> CrmResult<i64> {
    let query = apply_filters(leads::table.count().into_boxed(), scope, filters);
    Ok(query.get_result::<i64>(conn)?)
}

/// Newest first; ties on `created_at` break on id so pages never overlap.
pub fn load_page(
    conn: &mut PgConnection,
    scope: &Scope,
    filters: &LeadFilters,
    pagination: Pagination,
) -> CrmResult<Vec<Lead>> {
    let query = apply_filters(
        leads::table.select(Lead::as_select()).into_boxed(),
        scope,
        filters,
    );
    Ok(query
        .order((leads::created_at.desc(), leads::id.desc()))
        .limit(pagination.limit)
        .offset(pagination.offset())
        .load(conn)?)
}

pub fn find_scoped(conn: &mut PgConnection, lead_id: Uuid, scope: &Scope) -> CrmResult<Option<Lead>> {
    let query = apply_filters(
        leads::table
            .filter(leads::id.eq(lead_id))
            .select(Lead::as_select())
            .into_boxed(),
        scope,
        &LeadFilters::default(),
    );
    Ok(query.first(conn).optional()?)
}

/// Existing lead holding this phone key, matched exactly or as a substring
/// of a stored raw phone. `exclude` skips the lead being edited.
pub fn find_by_phone_key(
    conn: &mut PgConnection,
    phone_key: &str,
    exclude: Option<Uuid>,
) -> CrmResult<Option<Lead>> {
    let mut query = leads::table
        .filter(
            leads::phone_key
                .eq(phone_key.to_string())
                .or(leads::phone.like(format!("%{}%", escape_like(phone_key)))),
        )
        .select(Lead::as_select())
        .into_boxed();
    if let Some(id) = exclude {
        query = query.filter(leads::id.ne(id));
    }
    Ok(query
        .order(leads::created_at.asc())
        .first(conn)
        .optional()?)
}

pub enum InsertOutcome {
    Inserted(Lead),
    PhoneTaken,
}

pub fn insert_lead(conn: &mut PgConnection, new_lead: &NewLead) -> CrmResult<InsertOutcome> {
    let result = diesel::insert_into(leads::table)
        .values(new_lead)
        .returning(Lead::as_returning())
        .get_result(conn);

    match result {
        Ok(lead) => Ok(InsertOutcome::Inserted(lead)),
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            Ok(InsertOutcome::PhoneTaken)
        }
        Err(e) => Err(e.into()),
    }
}

/// Rows per INSERT statement. Each lead binds about twenty parameters and
/// Postgres caps a statement at 65535.
pub const INSERT_CHUNK_ROWS: usize = 1000;

/// Inserts every row, skipping any whose phone key is already taken.
/// Returns the ids of the rows actually written. Run inside a transaction
/// to keep the batch atomic across chunks.
pub fn insert_batch_skip_taken(conn: &mut PgConnection, rows: &[NewLead]) -> CrmResult<Vec<Uuid>> {
    let mut inserted = Vec::with_capacity(rows.len());
    for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
        let ids: Vec<Uuid> = diesel::insert_into(leads::table)
            .values(chunk)
            .on_conflict(leads::phone_key)
            .do_nothing()
            .returning(leads::id)
            .get_results(conn)?;
        inserted.extend(ids);
    }
    Ok(inserted)
}

pub enum UpdateOutcome {
    Updated(Lead),
    PhoneTaken,
}

pub fn update_lead(conn: &mut PgConnection, lead_id: Uuid, mut changes: LeadChangeset) -> CrmResult<UpdateOutcome> {
    changes.updated_at = Some(Utc::now());
    let result = diesel::update(leads::table.find(lead_id))
        .set(&changes)
        .returning(Lead::as_returning())
        .get_result(conn);

    match result {
        Ok(lead) => Ok(UpdateOutcome::Updated(lead)),
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            Ok(UpdateOutcome::PhoneTaken)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn delete_lead(conn: &mut PgConnection, lead_id: Uuid) -> CrmResult<usize> {
    Ok(diesel::delete(leads::table.find(lead_id)).execute(conn)?)
}

pub fn project_names(conn: &mut PgConnection, ids: &[Uuid]) -> CrmResult<HashMap<Uuid, String>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Uuid, String)> = projects::table
        .filter(projects::id.eq_any(ids))
        .select((projects::id, projects::name))
        .load(conn)?;
    Ok(rows.into_iter().collect())
}

pub fn project_exists(conn: &mut PgConnection, project_id: Uuid) -> CrmResult<bool> {
    Ok(diesel::select(diesel::dsl::exists(
        projects::table.filter(projects::id.eq(project_id)),
    ))
    .get_result(conn)?)
}

pub fn count_assigned_to(conn: &mut PgConnection, user_id: Uuid) -> CrmResult<i64> {
    Ok(leads::table
        .filter(leads::assigned_to_id.eq(user_id))
        .count()
        .get_result(conn)?)
}

pub fn lead_names(conn: &mut PgConnection, ids: &[Uuid]) -> CrmResult<HashMap<Uuid, String>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Uuid, String)> = leads::table
        .filter(leads::id.eq_any(ids))
        .select((leads::id, leads::name))
        .load(conn)?;
    Ok(rows.into_iter().collect())
}
