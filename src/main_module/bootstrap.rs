//! Process start-up: logging, configuration and the database pool.

use log::{error, info};

use crate::core::config::AppConfig;
use crate::core::shared::utils::{self, DbPool};

/// `RUST_LOG` wins; otherwise everything at `info`.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}

pub fn load_config() -> Result<AppConfig, std::io::Error> {
    let config = AppConfig::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;
    info!(
        "Server configured to listen on {}:{}",
        config.server.host, config.server.port
    );
    Ok(config)
}

/// Creates the pool and applies pending migrations.
pub fn init_database(config: &AppConfig) -> Result<DbPool, std::io::Error> {
    let pool = utils::create_conn(&config.database).map_err(|e| {
        error!("Failed to create database pool: {}", e);
        std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            format!("Database pool creation failed: {}", e),
        )
    })?;

    info!("Running database migrations...");
    utils::run_migrations(&pool).map_err(|e| {
        error!("Failed to run migrations: {}", e);
        std::io::Error::other(format!("Migration failed: {}", e))
    })?;
    info!("Database migrations completed successfully");

    Ok(pool)
}
