//! HTTP server initialization and routing

use axum::{routing::get, Router};
use log::{error, info};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::core::shared::state::AppState;
use crate::followups::configure_followups_routes;
use crate::leads::configure_leads_routes;
use crate::projects::configure_projects_routes;
use crate::security::{auth_middleware, create_cors_layer, AuthConfig};
use crate::users::configure_users_routes;

use super::{health_check, shutdown_signal};

/// Assembles every route behind the bearer-token middleware. `/health` is
/// the only anonymous path.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let auth_config = Arc::new(AuthConfig::from_app_config(&app_state.config));
    let cors = create_cors_layer(&app_state.config.server);

    Router::new()
        .route("/health", get(health_check))
        .merge(configure_leads_routes())
        .merge(configure_followups_routes())
        .merge(configure_projects_routes())
        .merge(configure_users_routes())
        .layer(axum::middleware::from_fn_with_state(
            auth_config,
            auth_middleware,
        ))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let addr = app_state.config.bind_address();
    let app = build_router(app_state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(
                "Failed to bind to {}: {} - is another instance running?",
                addr, e
            );
            return Err(e);
        }
    };
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)
}
