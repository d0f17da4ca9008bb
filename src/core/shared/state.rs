use crate::core::config::AppConfig;
use crate::core::shared::utils::DbPool;
use std::sync::Arc;

pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(conn: DbPool, config: AppConfig) -> Arc<Self> {
        Arc::new(Self { conn, config })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pool_state", &self.conn.state())
            .field("server", &self.config.server)
            .finish()
    }
}
