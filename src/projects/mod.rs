//! Projects that leads can be attached to.

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::error::{CrmError, CrmResult};
use crate::core::shared::extract::ApiJson;
use crate::core::shared::schema::projects;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::parse_json_body;
use crate::security::{authorize, CallerContext, Operation};

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable)]
#[diesel(table_name = projects)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub project_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = projects)]
struct NewProject<'a> {
    id: Uuid,
    name: &'a str,
    project_type: Option<&'a str>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: Option<String>,
    #[serde(alias = "type")]
    pub project_type: Option<String>,
}

pub fn list_projects(conn: &mut PgConnection, caller: &CallerContext) -> CrmResult<Vec<Project>> {
    authorize(caller, Operation::ListProjects)?;
    Ok(projects::table
        .select(Project::as_select())
        .order(projects::name.asc())
        .load(conn)?)
}

pub fn create_project(
    conn: &mut PgConnection,
    caller: &CallerContext,
    req: CreateProjectRequest,
) -> CrmResult<Project> {
    authorize(caller, Operation::CreateProject)?;
    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| CrmError::invalid("name", "is required"))?;
    let project_type = req
        .project_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let result = diesel::insert_into(projects::table)
        .values(&NewProject {
            id: Uuid::new_v4(),
            name,
            project_type,
            created_at: Utc::now(),
        })
        .returning(Project::as_returning())
        .get_result(conn);

    match result {
        Ok(project) => {
            info!("Project {} ({}) created by {}", project.name, project.id, caller.user_id);
            Ok(project)
        }
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Err(
            CrmError::Conflict(format!("Project '{name}' already exists")),
        ),
        Err(e) => Err(e.into()),
    }
}

/// Id of the project with exactly this name, creating it when absent.
pub fn resolve_or_create(conn: &mut PgConnection, name: &str) -> CrmResult<Uuid> {
    diesel::insert_into(projects::table)
        .values(&NewProject {
            id: Uuid::new_v4(),
            name,
            project_type: None,
            created_at: Utc::now(),
        })
        .on_conflict(projects::name)
        .do_nothing()
        .execute(conn)?;

    Ok(projects::table
        .filter(projects::name.eq(name))
        .select(projects::id)
        .first(conn)?)
}

pub async fn list_projects_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
) -> Result<Json<Vec<Project>>, CrmError> {
    authorize(&caller, Operation::ListProjects)?;
    let mut conn = state.conn.get()?;
    Ok(Json(list_projects(&mut conn, &caller)?))
}

pub async fn create_project_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> Result<(StatusCode, Json<Project>), CrmError> {
    authorize(&caller, Operation::CreateProject)?;
    let req: CreateProjectRequest = parse_json_body(body)?;
    let mut conn = state.conn.get()?;
    let project = create_project(&mut conn, &caller, req)?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub fn configure_projects_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/projects",
        get(list_projects_handler).post(create_project_handler),
    )
}
