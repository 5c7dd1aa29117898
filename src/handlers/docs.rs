// OpenAPI document generated from the handler annotations

use axum::{extract::State, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::app::AppState;
use crate::handlers::users::{
    CreateReferralCodeRequest, CreateUserRequest, DeactivationResponse, SearchCodeRequest,
    TokenRequest,
};
use crate::models::{ReferralCodeInfo, TokenResponse, UserInfo};

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Referral Service API",
        description = "User registration, login and referral code management"
    ),
    paths(
        crate::handlers::users::create_user,
        crate::handlers::users::issue_token,
        crate::handlers::users::new_referral_code,
        crate::handlers::users::deactivate_referral_code,
        crate::handlers::users::search_referral_code,
        crate::handlers::users::search_referred,
    ),
    components(
        schemas(
            CreateUserRequest,
            TokenRequest,
            TokenResponse,
            CreateReferralCodeRequest,
            SearchCodeRequest,
            DeactivationResponse,
            ReferralCodeInfo,
            UserInfo,
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "Users", description = "Registration and authentication"),
        (name = "Referral codes", description = "Create or deactivate referral codes"),
        (name = "Lookup", description = "Referral code and referred user lookup")
    )
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification at /api/v1/docs/openapi.json
pub async fn serve_openapi_spec(State(_state): State<AppState>) -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
