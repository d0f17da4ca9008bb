use anyhow::Context;
use log::info;

use leadserver::core::shared::state::AppState;
use leadserver::main_module::{init_database, init_logging, load_config, run_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = load_config().context("loading configuration")?;
    let pool = init_database(&config).context("initializing database")?;
    let state = AppState::new(pool, config);

    info!("Starting leadserver {}", env!("CARGO_PKG_VERSION"));
    run_server(state).await.context("running HTTP server")?;
    info!("leadserver stopped");
    Ok(())
}
