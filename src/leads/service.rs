//! Lead operations. Every call passes the access gate, then resolves the
//! caller's scope before touching the store.

use chrono::Utc;
use diesel::PgConnection;
use log::{info, warn};
use uuid::Uuid;

use super::phone::normalize_phone;
use super::repository::{self, InsertOutcome, UpdateOutcome};
use super::types::{
    clean, duplicate_message, parse_budget, CreateLeadOutcome, CreateLeadRequest,
    Lead, LeadChangeset, LeadDetail, LeadFilters, LeadListItem, LeadPage, ListLeadsQuery,
    NewLead, Pagination, ProjectRef, UpdateLeadRequest,
};
use crate::core::config::LeadSettings;
use crate::core::error::{CrmError, CrmResult, FieldError};
use crate::security::{authorize, resolve_scope, CallerContext, Operation, Scope};
use crate::users::{find_user, staff_refs, user_names};

pub fn list_leads(
    conn: &mut PgConnection,
    caller: &CallerContext,
    query: &ListLeadsQuery,
    settings: &LeadSettings,
) -> CrmResult<LeadPage> {
    authorize(caller, Operation::ListLeads)?;
    let pagination = Pagination::resolve(query.page, query.limit, settings)?;
    let filters = LeadFilters::from(query);
    let scope = resolve_scope(conn, caller)?;

    let total_count = repository::count_leads(conn, &scope, &filters)?;
    let leads = repository::load_page(conn, &scope, &filters, pagination)?;
    let items = with_names(conn, leads)?;

    Ok(LeadPage {
        items,
        total_count,
        total_pages: pagination.total_pages(total_count),
        page: pagination.page,
        limit: pagination.limit,
    })
}

fn with_names(conn: &mut PgConnection, leads: Vec<Lead>) -> CrmResult<Vec<LeadListItem>> {
    let agent_ids: Vec<Uuid> = leads.iter().map(|l| l.assigned_to_id).collect();
    let project_ids: Vec<Uuid> = leads.iter().filter_map(|l| l.project_id).collect();
    let agents = user_names(conn, &agent_ids)?;
    let projects = repository::project_names(conn, &project_ids)?;

    Ok(leads
        .into_iter()
        .map(|lead| LeadListItem {
            agent_name: agents.get(&lead.assigned_to_id).cloned().unwrap_or_default(),
            project_name: lead
                .project_id
                .and_then(|id| projects.get(&id).cloned())
                .unwrap_or_default(),
            lead,
        })
        .collect())
}

fn detail(conn: &mut PgConnection, lead: Lead) -> CrmResult<LeadDetail> {
    let assigned_to = staff_refs(conn, &[lead.assigned_to_id])?.remove(&lead.assigned_to_id);
    let project = match lead.project_id {
        Some(id) => repository::project_names(conn, &[id])?
            .remove(&id)
            .map(|name| ProjectRef { id, name }),
        None => None,
    };
    Ok(LeadDetail {
        lead,
        assigned_to,
        project,
    })
}

fn scoped_lead(conn: &mut PgConnection, lead_id: Uuid, scope: &Scope) -> CrmResult<Lead> {
    repository::find_scoped(conn, lead_id, scope)?.ok_or(CrmError::NotFoundOrUnauthorized("Lead"))
}

pub fn get_lead(conn: &mut PgConnection, caller: &CallerContext, lead_id: Uuid) -> CrmResult<LeadDetail> {
    authorize(caller, Operation::GetLead)?;
    let scope = resolve_scope(conn, caller)?;
    let lead = scoped_lead(conn, lead_id, &scope)?;
    detail(conn, lead)
}

/// Name, phone and country must be present; the phone must carry digits.
fn validate_intake(req: &CreateLeadRequest) -> Result<(String, String, String, String), Vec<FieldError>> {
    let mut errors = Vec::new();
    let name = clean(req.name.clone());
    let phone = clean(req.phone.clone());
    let country = clean(req.country.clone());

    if name.is_none() {
        errors.push(FieldError::required("name"));
    }
    if country.is_none() {
        errors.push(FieldError::required("country"));
    }
    let phone_key = match &phone {
        None => {
            errors.push(FieldError::required("phone"));
            String::new()
        }
        Some(raw) => {
            let key = normalize_phone(raw);
            if key.is_empty() {
                errors.push(FieldError::new("phone", "must contain digits"));
            }
            key
        }
    };

    match (name, phone, country) {
        (Some(name), Some(phone), Some(country)) if errors.is_empty() => {
            Ok((name, phone, phone_key, country))
        }
        _ => Err(errors),
    }
}

fn existing_outcome(conn: &mut PgConnection, existing: &Lead) -> CrmResult<CreateLeadOutcome> {
    let agent = find_user(conn, existing.assigned_to_id)?;
    let message = duplicate_message(agent.as_ref().map(|a| a.name.as_str()));
    warn!("Duplicate lead intake for phone key {}: {}", existing.phone_key, message);
    Ok(CreateLeadOutcome::Exists {
        message,
        existing_id: existing.id,
    })
}

pub fn create_lead(
    conn: &mut PgConnection,
    caller: &CallerContext,
    req: CreateLeadRequest,
) -> CrmResult<CreateLeadOutcome> {
    authorize(caller, Operation::CreateLead)?;
    let (name, phone, phone_key, country) = validate_intake(&req).map_err(CrmError::Validation)?;

    if let Some(existing) = repository::find_by_phone_key(conn, &phone_key, None)? {
        return existing_outcome(conn, &existing);
    }

    let mut errors = Vec::new();
    let budget = parse_budget(req.budget.as_ref());
    if budget < 0 {
        errors.push(FieldError::new("budget", "must not be negative"));
    }
    let assigned_to_id = req.assigned_to_id.unwrap_or(caller.user_id);
    if assigned_to_id != caller.user_id {
        let scope = resolve_scope(conn, caller)?;
        let exists = find_user(conn, assigned_to_id)?.is_some();
        if !exists || !scope.contains(assigned_to_id) {
            errors.push(FieldError::new("assignedToId", "must be a user within your scope"));
        }
    }
    if let Some(project_id) = req.project_id {
        if !repository::project_exists(conn, project_id)? {
            errors.push(FieldError::new("projectId", "unknown project"));
        }
    }
    if !errors.is_empty() {
        return Err(CrmError::Validation(errors));
    }

    let now = Utc::now();
    let new_lead = NewLead {
        id: Uuid::new_v4(),
        name,
        phone,
        phone_key: phone_key.clone(),
        email: clean(req.email),
        country,
        city: clean(req.city),
        area_interested_in: clean(req.area_interested_in),
        plan_interested_in: clean(req.plan_interested_in),
        property_type: clean(req.property_type),
        project_id: req.project_id,
        budget,
        plan_to_purchase: clean(req.plan_to_purchase),
        lead_source: clean(req.lead_source),
        notes: Some(req.notes.unwrap_or_default()),
        status: req.status.unwrap_or_default(),
        assigned_to_id,
        created_by_id: caller.user_id,
        created_at: now,
        updated_at: now,
    };

    match repository::insert_lead(conn, &new_lead)? {
        InsertOutcome::Inserted(lead) => {
            info!(
                "Lead {} created by {} and assigned to {}",
                lead.id, caller.user_id, lead.assigned_to_id
            );
            Ok(CreateLeadOutcome::Created(lead))
        }
        InsertOutcome::PhoneTaken => {
            // Lost a race with a concurrent intake for the same phone.
            match repository::find_by_phone_key(conn, &phone_key, None)? {
                Some(existing) => existing_outcome(conn, &existing),
                None => Err(CrmError::Conflict(duplicate_message(None))),
            }
        }
    }
}

fn required_text(field: &str, value: Option<String>, errors: &mut Vec<FieldError>) -> Option<String> {
    match value {
        Some(raw) => {
            let trimmed = raw.trim().to_string();
            if trimmed.is_empty() {
                errors.push(FieldError::new(field, "must not be blank"));
                None
            } else {
                Some(trimmed)
            }
        }
        None => None,
    }
}

pub fn update_lead(
    conn: &mut PgConnection,
    caller: &CallerContext,
    lead_id: Uuid,
    req: UpdateLeadRequest,
) -> CrmResult<LeadDetail> {
    authorize(caller, Operation::UpdateLead)?;
    if req.is_empty() {
        return Err(CrmError::invalid("body", "no updatable fields supplied"));
    }
    let scope = resolve_scope(conn, caller)?;
    scoped_lead(conn, lead_id, &scope)?;

    let mut errors = Vec::new();
    let name = required_text("name", req.name, &mut errors);
    let country = required_text("country", req.country, &mut errors);
    let phone = required_text("phone", req.phone, &mut errors);
    let phone_key = phone.as_deref().map(normalize_phone);
    if phone_key.as_deref() == Some("") {
        errors.push(FieldError::new("phone", "must contain digits"));
    }
    if req.budget.is_some_and(|b| b < 0) {
        errors.push(FieldError::new("budget", "must not be negative"));
    }
    if let Some(Some(project_id)) = req.project_id {
        if !repository::project_exists(conn, project_id)? {
            errors.push(FieldError::new("projectId", "unknown project"));
        }
    }
    if !errors.is_empty() {
        return Err(CrmError::Validation(errors));
    }

    if let Some(key) = &phone_key {
        if repository::find_by_phone_key(conn, key, Some(lead_id))?.is_some() {
            return Err(CrmError::Conflict(
                "Phone number already belongs to another lead".to_string(),
            ));
        }
    }

    let changes = LeadChangeset {
        name,
        phone,
        phone_key,
        email: req.email.map(clean),
        country,
        city: req.city.map(clean),
        area_interested_in: req.area_interested_in.map(clean),
        plan_interested_in: req.plan_interested_in.map(clean),
        property_type: req.property_type.map(clean),
        project_id: req.project_id,
        budget: req.budget,
        plan_to_purchase: req.plan_to_purchase.map(clean),
        lead_source: req.lead_source.map(clean),
        notes: req.notes.map(clean),
        status: req.status,
        ..Default::default()
    };

    match repository::update_lead(conn, lead_id, changes)? {
        UpdateOutcome::Updated(lead) => {
            info!("Lead {} updated by {}", lead.id, caller.user_id);
            detail(conn, lead)
        }
        UpdateOutcome::PhoneTaken => Err(CrmError::Conflict(
            "Phone number already belongs to another lead".to_string(),
        )),
    }
}

pub fn delete_lead(conn: &mut PgConnection, caller: &CallerContext, lead_id: Uuid) -> CrmResult<()> {
    authorize(caller, Operation::DeleteLead)?;
    let scope = resolve_scope(conn, caller)?;
    scoped_lead(conn, lead_id, &scope)?;
    if repository::delete_lead(conn, lead_id)? == 0 {
        return Err(CrmError::NotFoundOrUnauthorized("Lead"));
    }
    info!("Lead {} deleted by {}", lead_id, caller.user_id);
    Ok(())
}

pub fn reassign_lead(
    conn: &mut PgConnection,
    caller: &CallerContext,
    lead_id: Uuid,
    new_assignee_id: Uuid,
) -> CrmResult<LeadDetail> {
    authorize(caller, Operation::ReassignLead)?;
    let scope = resolve_scope(conn, caller)?;
    let lead = scoped_lead(conn, lead_id, &scope)?;

    if find_user(conn, new_assignee_id)?.is_none() {
        return Err(CrmError::invalid("newAssigneeId", "user does not exist"));
    }
    if !scope.contains(new_assignee_id) {
        return Err(CrmError::invalid("newAssigneeId", "user is outside your scope"));
    }

    let changes = LeadChangeset {
        assigned_to_id: Some(new_assignee_id),
        ..Default::default()
    };
    match repository::update_lead(conn, lead_id, changes)? {
        UpdateOutcome::Updated(updated) => {
            info!(
                "Lead {} reassigned from {} to {} by {}",
                lead_id, lead.assigned_to_id, new_assignee_id, caller.user_id
            );
            detail(conn, updated)
        }
        UpdateOutcome::PhoneTaken => Err(CrmError::Conflict(
            "Phone number already belongs to another lead".to_string(),
        )),
    }
}
