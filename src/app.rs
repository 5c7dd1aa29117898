// Application state and router assembly
use std::sync::Arc;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    app_config::AppConfig,
    handlers::{self, docs, health},
    middleware::{build_cors_layer, build_rate_limiter, rate_limit_middleware},
    services::{short_code::ShortCodeError, JwtService, ReferralService, ShortCodeGenerator},
    store::ReferralStore,
};

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ReferralStore>,
    pub jwt_service: Arc<JwtService>,
    pub referral_service: Arc<ReferralService>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn ReferralStore>) -> Result<Self, ShortCodeError> {
        let generator = ShortCodeGenerator::new(config.referral.max_code_attempts)?;
        Ok(Self::with_generator(config, store, generator))
    }

    /// State whose referral codes come from the given generator
    pub fn with_generator(
        config: AppConfig,
        store: Arc<dyn ReferralStore>,
        generator: ShortCodeGenerator,
    ) -> Self {
        let jwt_service = Arc::new(JwtService::from_app_config(&config.jwt));
        let referral_service = Arc::new(ReferralService::new(
            store.clone(),
            jwt_service.clone(),
            generator,
            config.security.bcrypt_cost,
            config.referral.default_expiration_days,
        ));

        Self {
            config: Arc::new(config),
            store,
            jwt_service,
            referral_service,
        }
    }
}

/// Full HTTP surface: user routes, health and optional API docs
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let mut user_routes = handlers::user_routes();
    if config.features.enable_rate_limiting {
        if let Some(limiter) = build_rate_limiter(config.security.rate_limit_per_minute) {
            info!(
                per_minute = config.security.rate_limit_per_minute,
                "Rate limiting enabled"
            );
            user_routes = user_routes.layer(from_fn_with_state(limiter, rate_limit_middleware));
        }
    }

    let mut router = Router::new()
        .nest("/api/v1/users", user_routes)
        .route("/health", get(health::health_check));

    if config.features.enable_swagger_ui {
        router = router.route("/api/v1/docs/openapi.json", get(docs::serve_openapi_spec));
    }

    router
        .layer(build_cors_layer(&config.security))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
