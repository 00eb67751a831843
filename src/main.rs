mod app;
mod config;
mod database;
mod error;
mod filters;
mod flash;
mod handlers;
mod inventory;
mod models;
mod realtime;
mod repository;
mod shelf;
mod store;

use anyhow::Context;
use dotenvy::dotenv;

use app::{create_router, AppState};
use config::Config;
use database::{create_database_pool, run_migrations};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    let config = Config::from_env()?;
    let addr = config.bind_addr()?;

    // Initialize database
    let db = create_database_pool(&config)
        .await
        .context("Failed to connect to database")?;

    if config.run_migrations {
        run_migrations(&db).await.context("Failed to run migrations")?;
        log::info!("Migrations applied");
    }

    let state = AppState::new(db.clone(), config);

    // Initial load, then keep the mirror current from change notifications
    state.store.refresh_all().await;
    realtime::spawn_store_refresher(state.store.clone(), &state.feed);
    realtime::spawn_listener(db, state.feed.clone());

    let app = create_router(state);

    log::info!("Souko server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
