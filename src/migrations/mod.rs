// Embedded migrations, applied at startup for the Postgres backend

pub mod diesel;

use crate::app_config::AppConfig;
use std::error::Error;
use tracing::{error, info};

/// Apply pending schema migrations unless disabled in configuration
pub async fn run_all_migrations(config: &AppConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
    if !should_run_migrations(config) {
        info!("[MIGRATIONS] Skipping Diesel migrations (disabled in config)");
        return Ok(());
    }

    info!(
        "[MIGRATIONS] Starting migration process for environment: {}",
        config.server.environment
    );

    match diesel::run_migrations(&config.database.url).await {
        Ok(0) => info!("[MIGRATIONS] Diesel migrations up to date"),
        Ok(applied_count) => info!("[MIGRATIONS] Applied {} Diesel migrations", applied_count),
        Err(e) => {
            error!("[MIGRATIONS] Diesel migration failed: {}", e);
            return Err(format!("Diesel migration failed: {}", e).into());
        },
    }

    let status = diesel::check_migration_status(&config.database.url).await?;
    if !status.is_up_to_date() {
        return Err(format!(
            "Migrations still pending after run: {:?}",
            status.pending_migrations
        )
        .into());
    }
    info!(
        applied = status.applied_count,
        "[MIGRATIONS] Schema is up to date"
    );

    Ok(())
}

pub fn should_run_migrations(config: &AppConfig) -> bool {
    !config.features.disable_embedded_migrations
}
