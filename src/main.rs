use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use food_delivery::api::create_api_router;
use food_delivery::config::Config;
use food_delivery::entities::{connect, setup_schema};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Invalid configuration: {err}");
            std::process::exit(1);
        }
    };

    let db = match connect(&config.database_url).await {
        Ok(db) => db,
        Err(err) => {
            tracing::error!("Failed to connect to {}: {err}", config.database_url);
            std::process::exit(1);
        }
    };
    if let Err(err) = setup_schema(&db).await {
        tracing::error!("Failed to create schema: {err}");
        std::process::exit(1);
    }

    let addr = config.bind_addr();
    let app = create_api_router(Arc::new(db), Arc::new(config));

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("Failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };
    tracing::info!("Running at {addr}");
    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("Server stopped: {err}");
    }
}
