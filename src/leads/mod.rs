//! Lead tracking: intake with phone deduplication, scoped listing,
//! allowlisted updates, reassignment and bulk import.

pub mod handlers;
pub mod import;
pub mod phone;
pub mod repository;
pub mod service;
pub mod summary;
pub mod types;

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub use phone::normalize_phone;
pub use types::{CreateLeadOutcome, Lead, LeadDetail, LeadPage};

pub fn configure_leads_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/leads",
            get(handlers::list_leads_handler).post(handlers::create_lead_handler),
        )
        .route("/api/leads/summary", get(handlers::lead_summary_handler))
        .route("/api/leads/import", post(handlers::import_leads_handler))
        .route(
            "/api/leads/:id",
            get(handlers::get_lead_handler)
                .put(handlers::update_lead_handler)
                .delete(handlers::delete_lead_handler),
        )
        .route("/api/leads/:id/reassign", patch(handlers::reassign_lead_handler))
}
