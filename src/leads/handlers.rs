//! HTTP handlers for lead endpoints. Each handler runs the access gate
//! before checking out a connection.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::import::{import_leads, ImportPayload, ImportReport};
use super::service;
use super::summary::{lead_summary, LeadSummary};
use super::types::{
    CreateLeadOutcome, CreateLeadRequest, LeadDetail, LeadPage, ListLeadsQuery,
    ReassignLeadRequest, UpdateLeadRequest,
};
use crate::core::error::CrmError;
use crate::core::shared::extract::{ApiJson, ApiPath, ApiQuery};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::parse_json_body;
use crate::security::{authorize, CallerContext, Operation};

pub async fn list_leads_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    ApiQuery(query): ApiQuery<ListLeadsQuery>,
) -> Result<Json<LeadPage>, CrmError> {
    authorize(&caller, Operation::ListLeads)?;
    let mut conn = state.conn.get()?;
    let page = service::list_leads(&mut conn, &caller, &query, &state.config.leads)?;
    Ok(Json(page))
}

pub async fn lead_summary_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
) -> Result<Json<LeadSummary>, CrmError> {
    authorize(&caller, Operation::LeadSummary)?;
    let mut conn = state.conn.get()?;
    Ok(Json(lead_summary(&mut conn, &caller)?))
}

pub async fn get_lead_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    ApiPath(lead_id): ApiPath<Uuid>,
) -> Result<Json<LeadDetail>, CrmError> {
    authorize(&caller, Operation::GetLead)?;
    let mut conn = state.conn.get()?;
    Ok(Json(service::get_lead(&mut conn, &caller, lead_id)?))
}

pub async fn create_lead_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    ApiJson(body): ApiJson<Value>,
) -> Result<Response, CrmError> {
    authorize(&caller, Operation::CreateLead)?;
    let req: CreateLeadRequest = parse_json_body(body)?;
    let mut conn = state.conn.get()?;

    match service::create_lead(&mut conn, &caller, req)? {
        CreateLeadOutcome::Created(lead) => Ok((StatusCode::CREATED, Json(lead)).into_response()),
        CreateLeadOutcome::Exists {
            message,
            existing_id,
        } => Ok((
            StatusCode::OK,
            Json(json!({
                "exists": true,
                "message": message,
                "leadId": existing_id,
            })),
        )
            .into_response()),
    }
}

pub async fn import_leads_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    ApiJson(body): ApiJson<Value>,
) -> Result<Json<ImportReport>, CrmError> {
    authorize(&caller, Operation::ImportLeads)?;
    let payload: ImportPayload = parse_json_body(body)?;
    let mut conn = state.conn.get()?;
    Ok(Json(import_leads(&mut conn, &caller, payload.into_rows())?))
}

pub async fn update_lead_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    ApiPath(lead_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<Value>,
) -> Result<Json<LeadDetail>, CrmError> {
    authorize(&caller, Operation::UpdateLead)?;
    let req: UpdateLeadRequest = parse_json_body(body)?;
    let mut conn = state.conn.get()?;
    Ok(Json(service::update_lead(&mut conn, &caller, lead_id, req)?))
}

pub async fn delete_lead_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    ApiPath(lead_id): ApiPath<Uuid>,
) -> Result<Json<Value>, CrmError> {
    authorize(&caller, Operation::DeleteLead)?;
    let mut conn = state.conn.get()?;
    service::delete_lead(&mut conn, &caller, lead_id)?;
    Ok(Json(json!({
        "success": true,
        "message": "Lead deleted",
        "id": lead_id,
    })))
}

pub async fn reassign_lead_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    ApiPath(lead_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<Value>,
) -> Result<Json<LeadDetail>, CrmError> {
    authorize(&caller, Operation::ReassignLead)?;
    let req: ReassignLeadRequest = parse_json_body(body)?;
    let mut conn = state.conn.get()?;
    Ok(Json(service::reassign_lead(
        &mut conn,
        &caller,
        lead_id,
        req.new_assignee_id,
    )?))
}
