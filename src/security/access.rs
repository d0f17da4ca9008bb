//! Role allow-lists per operation.
//!
//! The gate runs before any scoping or store access and is independent of
//! the reporting hierarchy.

use log::warn;

use crate::core::error::{CrmError, CrmResult};
use crate::core::shared::enums::Role;
use crate::security::auth_api::CallerContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListLeads,
    GetLead,
    LeadSummary,
    CreateLead,
    ImportLeads,
    UpdateLead,
    DeleteLead,
    ReassignLead,
    CreateFollowup,
    ListFollowupsForLead,
    ListAllFollowups,
    FollowupLogs,
    ToggleFollowupStatus,
    UpdateFollowup,
    DeleteFollowup,
    ListProjects,
    CreateProject,
    ListUsers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allowed {
    /// Any authenticated caller. Visibility is then limited by scoping.
    AnyCaller,
    Roles(&'static [Role]),
}

const FIELD_ROLES: &[Role] = &[
    Role::Agent,
    Role::Manager,
    Role::SrManager,
    Role::Director,
    Role::Cco,
    Role::Admin,
];

const MANAGEMENT_ROLES: &[Role] = &[
    Role::Manager,
    Role::SrManager,
    Role::Director,
    Role::Cco,
    Role::Admin,
];

const LEADERSHIP_ROLES: &[Role] = &[Role::Director, Role::Cco, Role::Admin];

impl Operation {
    pub const ALL: [Operation; 18] = [
        Self::ListLeads,
        Self::GetLead,
        Self::LeadSummary,
        Self::CreateLead,
        Self::ImportLeads,
        Self::UpdateLead,
        Self::DeleteLead,
        Self::ReassignLead,
        Self::CreateFollowup,
        Self::ListFollowupsForLead,
        Self::ListAllFollowups,
        Self::FollowupLogs,
        Self::ToggleFollowupStatus,
        Self::UpdateFollowup,
        Self::DeleteFollowup,
        Self::ListProjects,
        Self::CreateProject,
        Self::ListUsers,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::ListLeads => "listLeads",
            Self::GetLead => "getLead",
            Self::LeadSummary => "leadSummary",
            Self::CreateLead => "createLead",
            Self::ImportLeads => "importLeads",
            Self::UpdateLead => "updateLead",
            Self::DeleteLead => "deleteLead",
            Self::ReassignLead => "reassignLead",
            Self::CreateFollowup => "createFollowup",
            Self::ListFollowupsForLead => "listFollowupsForLead",
            Self::ListAllFollowups => "listAllFollowups",
            Self::FollowupLogs => "followupLogs",
            Self::ToggleFollowupStatus => "toggleFollowupStatus",
            Self::UpdateFollowup => "updateFollowup",
            Self::DeleteFollowup => "deleteFollowup",
            Self::ListProjects => "listProjects",
            Self::CreateProject => "createProject",
            Self::ListUsers => "listUsers",
        }
    }

    pub fn allowed(&self) -> Allowed {
        match self {
            Self::ListLeads
            | Self::GetLead
            | Self::LeadSummary
            | Self::ListFollowupsForLead
            | Self::ListProjects
            | Self::ListUsers => Allowed::AnyCaller,

            Self::CreateLead
            | Self::CreateFollowup
            | Self::ListAllFollowups
            | Self::FollowupLogs
            | Self::ToggleFollowupStatus
            | Self::UpdateFollowup => Allowed::Roles(FIELD_ROLES),

            Self::ImportLeads | Self::UpdateLead | Self::DeleteFollowup => {
                Allowed::Roles(MANAGEMENT_ROLES)
            }

            Self::DeleteLead | Self::ReassignLead | Self::CreateProject => {
                Allowed::Roles(LEADERSHIP_ROLES)
            }
        }
    }

    pub fn permits(&self, role: Role) -> bool {
        match self.allowed() {
            Allowed::AnyCaller => true,
            Allowed::Roles(roles) => roles.contains(&role),
        }
    }
}

pub fn authorize(caller: &CallerContext, operation: Operation) -> CrmResult<()> {
    if operation.permits(caller.role) {
        return Ok(());
    }
    warn!(
        "Denied {} for user={} role={}",
        operation.name(),
        caller.user_id,
        caller.role
    );
    Err(CrmError::Forbidden(format!(
        "role {} may not perform {}",
        caller.role,
        operation.name()
    )))
}
