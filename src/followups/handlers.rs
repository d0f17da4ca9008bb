use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::service;
use super::types::{
    CreateFollowupRequest, FollowUpListItem, FollowUpLog, FollowUpWithLogs, LeadFollowUp,
    ListFollowupsQuery, UpdateFollowupRequest,
};
use crate::core::error::CrmError;
use crate::core::shared::extract::{ApiJson, ApiPath, ApiQuery};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::parse_json_body;
use crate::security::{authorize, CallerContext, Operation};

pub async fn create_followup_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    ApiJson(body): ApiJson<Value>,
) -> Result<(StatusCode, Json<FollowUpWithLogs>), CrmError> {
    authorize(&caller, Operation::CreateFollowup)?;
    let req: CreateFollowupRequest = parse_json_body(body)?;
    let mut conn = state.conn.get()?;
    let created = service::create_followup(&mut conn, &caller, req)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_followups_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    ApiQuery(query): ApiQuery<ListFollowupsQuery>,
) -> Result<Json<Vec<FollowUpListItem>>, CrmError> {
    authorize(&caller, Operation::ListAllFollowups)?;
    let mut conn = state.conn.get()?;
    Ok(Json(service::list_all(&mut conn, &caller, &query)?))
}

pub async fn list_lead_followups_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    ApiPath(lead_id): ApiPath<Uuid>,
) -> Result<Json<Vec<LeadFollowUp>>, CrmError> {
    authorize(&caller, Operation::ListFollowupsForLead)?;
    let mut conn = state.conn.get()?;
    Ok(Json(service::list_for_lead(&mut conn, &caller, lead_id)?))
}

pub async fn followup_logs_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    ApiPath(followup_id): ApiPath<Uuid>,
) -> Result<Json<Vec<FollowUpLog>>, CrmError> {
    authorize(&caller, Operation::FollowupLogs)?;
    let mut conn = state.conn.get()?;
    Ok(Json(service::followup_logs(&mut conn, &caller, followup_id)?))
}

pub async fn toggle_status_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    ApiPath(followup_id): ApiPath<Uuid>,
) -> Result<Json<FollowUpLog>, CrmError> {
    authorize(&caller, Operation::ToggleFollowupStatus)?;
    let mut conn = state.conn.get()?;
    Ok(Json(service::toggle_status(&mut conn, &caller, followup_id)?))
}

pub async fn update_followup_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    ApiPath(followup_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<Value>,
) -> Result<Json<FollowUpWithLogs>, CrmError> {
    authorize(&caller, Operation::UpdateFollowup)?;
    let req: UpdateFollowupRequest = parse_json_body(body)?;
    let mut conn = state.conn.get()?;
    Ok(Json(service::update_followup(&mut conn, &caller, followup_id, req)?))
}

pub async fn delete_followup_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    ApiPath(followup_id): ApiPath<Uuid>,
) -> Result<Json<Value>, CrmError> {
    authorize(&caller, Operation::DeleteFollowup)?;
    let mut conn = state.conn.get()?;
    service::delete_followup(&mut conn, &caller, followup_id)?;
    Ok(Json(json!({
        "success": true,
        "message": "Follow-up deleted",
        "id": followup_id,
    })))
}
