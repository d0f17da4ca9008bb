//! User directory: reporting edges for scope resolution and the scoped
//! user listing used by assignment pickers.

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::error::{CrmError, CrmResult};
use crate::core::shared::enums::Role;
use crate::core::shared::schema::users;
use crate::core::shared::extract::ApiQuery;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::empty_string_as_none;
use crate::security::{
    authorize, resolve_scope, CallerContext, Operation, ReportingLink, Scope, UserDirectory,
};

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// `{id, name}` reference embedded in lead and follow-up views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Queryable)]
pub struct UserRef {
    pub id: Uuid,
    pub name: String,
}

/// `{id, name, role}` of the user owning or writing a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StaffRef {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

impl UserDirectory for PgConnection {
    fn reporting_to(&mut self, link: ReportingLink, superiors: &[Uuid]) -> CrmResult<Vec<Uuid>> {
        if superiors.is_empty() {
            return Ok(Vec::new());
        }
        let query = users::table.select(users::id).into_boxed();
        let query = match link {
            ReportingLink::Manager => query.filter(users::manager_id.eq_any(superiors)),
            ReportingLink::SrManager => query.filter(users::sr_manager_id.eq_any(superiors)),
            ReportingLink::Director => query.filter(users::director_id.eq_any(superiors)),
        };
        Ok(query.load::<Uuid>(self)?)
    }
}

pub fn find_user(conn: &mut PgConnection, user_id: Uuid) -> CrmResult<Option<UserSummary>> {
    Ok(users::table
        .find(user_id)
        .select(UserSummary::as_select())
        .first(conn)
        .optional()?)
}

/// Names for a batch of user ids. Unknown ids are absent from the map.
pub fn user_names(conn: &mut PgConnection, ids: &[Uuid]) -> CrmResult<HashMap<Uuid, String>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Uuid, String)> = users::table
        .filter(users::id.eq_any(ids))
        .select((users::id, users::name))
        .load(conn)?;
    Ok(rows.into_iter().collect())
}

pub fn staff_refs(conn: &mut PgConnection, ids: &[Uuid]) -> CrmResult<HashMap<Uuid, StaffRef>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<StaffRef> = users::table
        .filter(users::id.eq_any(ids))
        .select(StaffRef::as_select())
        .load(conn)?;
    Ok(rows.into_iter().map(|staff| (staff.id, staff)).collect())
}

pub fn user_ref(names: &HashMap<Uuid, String>, id: Uuid) -> UserRef {
    UserRef {
        id,
        name: names.get(&id).cloned().unwrap_or_default(),
    }
}

pub fn list_users(
    conn: &mut PgConnection,
    caller: &CallerContext,
    role: Option<Role>,
) -> CrmResult<Vec<UserSummary>> {
    authorize(caller, Operation::ListUsers)?;
    let scope = resolve_scope(conn, caller)?;

    let mut query = users::table.select(UserSummary::as_select()).into_boxed();
    if let Scope::Owners(ids) = &scope {
        query = query.filter(users::id.eq_any(ids.iter().copied().collect::<Vec<_>>()));
    }
    if let Some(role) = role {
        query = query.filter(users::role.eq(role));
    }
    Ok(query.order(users::name.asc()).load(conn)?)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub role: Option<String>,
}

pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    ApiQuery(query): ApiQuery<ListUsersQuery>,
) -> Result<Json<Vec<UserSummary>>, CrmError> {
    authorize(&caller, Operation::ListUsers)?;
    let role = match query.role {
        Some(raw) => match raw.parse::<Role>().unwrap_or_default() {
            Role::Unrecognized => return Err(CrmError::invalid("role", "unknown role")),
            role => Some(role),
        },
        None => None,
    };
    let mut conn = state.conn.get()?;
    Ok(Json(list_users(&mut conn, &caller, role)?))
}

pub fn configure_users_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/users", get(list_users_handler))
}
