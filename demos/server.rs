//! Runs the registry authentication API with in-memory collaborators.
//!
//! ```bash
//! REGISTRY_AUTH_JWT_SECRET=$(openssl rand -hex 32) \
//! RUST_LOG=registry_auth=debug,tower_http=info \
//! cargo run --example server
//! ```
//!
//! An administrator `admin` is seeded with the password from
//! `REGISTRY_AUTH_ADMIN_PASSWORD` (default `change-me`).
use std::sync::Arc;

use registry_auth::auth::password::hash_password;
use registry_auth::auth::{AdminAccount, MemoryAdminDirectory, MemoryLedger, MemoryRegistry};
use registry_auth::{AuthConfig, AuthFlow, ConfigPreset};
use tracing_subscriber::EnvFilter;

fn random_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match AuthConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("{e}; using a random secret, sessions will not survive a restart");
            AuthConfig::new(random_secret(), ConfigPreset::FromEnv)
        }
    };
    tracing::info!("{}", config.summary());

    let admins = MemoryAdminDirectory::new();
    let admin_password =
        std::env::var("REGISTRY_AUTH_ADMIN_PASSWORD").unwrap_or_else(|_| "change-me".to_string());
    admins
        .add_admin(AdminAccount::new("admin", hash_password(&admin_password)?))
        .await;

    let flow = AuthFlow::builder(config)
        .with_registry(Arc::new(MemoryRegistry::new()))
        .with_ledger(Arc::new(MemoryLedger::new()))
        .with_admins(Arc::new(admins))
        .build_and_init()
        .await?;

    let frontend = std::env::var("REGISTRY_AUTH_FRONTEND_URL")
        .unwrap_or_else(|_| "http://localhost:5173".to_string());
    let app = registry_auth::http::router(Arc::new(flow))
        .layer(registry_auth::http::cors_layer(&frontend)?);

    let bind = std::env::var("REGISTRY_AUTH_BIND").unwrap_or_else(|_| "127.0.0.1:5000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, %frontend, "registry auth server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
