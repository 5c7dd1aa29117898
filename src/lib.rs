// Library exports for the referral service

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use app::{build_router, AppState};
pub use app_config::{AppConfig, ConfigError, StorageBackend};
pub use db::DieselPool;
pub use models::auth::AccessTokenClaims;
pub use services::{JwtConfig, JwtError, JwtService, ReferralService, ShortCodeGenerator};
pub use store::{InMemoryReferralStore, PgReferralStore, ReferralStore, StoreError};
pub use utils::service_error::ServiceError;

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Build the store selected by configuration and the state around it
pub async fn initialize_app_state(
    config: AppConfig,
) -> Result<AppState, Box<dyn std::error::Error + Send + Sync>> {
    let store: Arc<dyn ReferralStore> = match config.storage_backend {
        StorageBackend::Postgres => {
            info!(
                database = %db::mask_connection_string(&config.database.url),
                "Initializing database pool..."
            );
            let pool = db::create_diesel_pool(db::DieselDatabaseConfig::from(&config.database))
                .await?;

            migrations::run_all_migrations(&config).await?;

            Arc::new(PgReferralStore::new(
                pool,
                Duration::from_secs(config.database.query_timeout),
            ))
        },
        StorageBackend::Memory => {
            info!("Using in-memory store; data is lost on restart");
            Arc::new(InMemoryReferralStore::new())
        },
    };

    Ok(AppState::new(config, store)?)
}
