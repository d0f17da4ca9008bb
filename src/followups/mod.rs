//! Follow-up scheduling with an append-only status log.

pub mod handlers;
pub mod lifecycle;
pub mod repository;
pub mod service;
pub mod types;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub use lifecycle::{derive_current_status, next_toggle_status, DueState};
pub use types::{FollowUp, FollowUpLog, FollowUpWithLogs};

pub fn configure_followups_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/followups",
            post(handlers::create_followup_handler).get(handlers::list_followups_handler),
        )
        .route(
            "/api/followups/lead/:lead_id",
            get(handlers::list_lead_followups_handler),
        )
        .route("/api/followups/:id/logs", get(handlers::followup_logs_handler))
        .route("/api/followups/:id/status", patch(handlers::toggle_status_handler))
        .route(
            "/api/followups/:id",
            put(handlers::update_followup_handler)
                .delete(handlers::delete_followup_handler),
        )
}
