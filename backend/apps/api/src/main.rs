//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

mod config;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use store::MongoClient;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use users::{DocumentUserRepository, PgUserRepository, USERS_COLLECTION, users_router};

use crate::config::AppConfig;
use crate::routes::{ServiceInfo, app_router};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = %config.service_name,
        version = %config.version,
        mode = %config.run_mode,
        "Starting server"
    );

    config.verify_secret()?;

    // User store: relational first, then document store
    let mut mongo: Option<MongoClient> = None;
    let users: Option<Router> = if config.enable_pg {
        let database_url = config.database_url.as_deref().unwrap_or_default();
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        tracing::info!("Connected to database");

        // Run migrations
        sqlx::migrate!("../../../database/migrations")
            .run(&pool)
            .await?;

        tracing::info!("Migrations completed");

        Some(users_router(PgUserRepository::new(pool)))
    } else if config.enable_mongodb {
        let client = MongoClient::connect(&config.mongo).await?;
        client.ensure_collections(&[USERS_COLLECTION]).await?;

        let repo = DocumentUserRepository::new(Arc::new(client.clone()));
        mongo = Some(client);
        Some(users_router(repo))
    } else {
        tracing::warn!("Neither ENABLE_PG nor ENABLE_MONGODB is set, users API not mounted");
        None
    };

    let info = ServiceInfo {
        service: config.service_name.clone(),
        version: config.version.clone(),
    };
    let app = app_router(info, users, &config.cors_origins);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(client) = mongo {
        client.disconnect().await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
