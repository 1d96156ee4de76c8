use std::sync::Arc;

use anyhow::Result;
use flag_config_api::{app, config, middleware, services::ConfigService};
use persistence::repositories::PgConfigStore;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Load configuration
    let config = config::Config::load()?;

    // Initialize logging and the Prometheus recorder
    middleware::logging::init_logging(&config.logging);
    middleware::init_metrics()?;

    info!("Starting Flag Config API v{}", env!("CARGO_PKG_VERSION"));

    // Create database pool
    let pool = persistence::db::create_pool(&(&config.database).into()).await?;

    // Run migrations
    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    let service = ConfigService::new(Arc::new(PgConfigStore::new(pool)));

    // Build application
    let addr = config.socket_addr()?;
    let app = app::create_app(config, service);

    // Start server
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
