// User and referral code endpoints under /api/v1/users

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    app::AppState,
    handlers::extract::ValidatedJson,
    middleware::CurrentUser,
    models::{ReferralCodeInfo, TokenResponse, UserInfo},
    utils::{service_error::ServiceError, validation::deserialize_email},
};

// =============================================================================
// REQUEST / RESPONSE TYPES
// =============================================================================

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[serde(deserialize_with = "deserialize_email")]
    #[validate(email)]
    #[validate(length(max = 320))]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,

    /// Code of the user who referred this one
    #[serde(default)]
    pub referral_code: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct TokenRequest {
    #[serde(deserialize_with = "deserialize_email")]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateReferralCodeRequest {
    /// Lifetime of the new code in days
    #[validate(range(min = 1))]
    pub days: i64,
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct SearchCodeRequest {
    #[serde(deserialize_with = "deserialize_email")]
    pub email: String,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, ToSchema)]
pub struct DeactivationResponse {
    pub detail: String,
}

impl Default for DeactivationResponse {
    fn default() -> Self {
        Self {
            detail: "The referral code has been successfully deactivated.".to_string(),
        }
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// Register a user, optionally with a referral code
#[utoipa::path(
    post,
    path = "/api/v1/users/create",
    tag = "Users",
    operation_id = "createUser",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User registered", body = UserInfo),
        (status = 400, description = "Invalid referral code, email taken or invalid input"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserInfo>), ServiceError> {
    let user = state
        .referral_service
        .register(
            &request.email,
            &request.password,
            request.referral_code.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/api/v1/users/token",
    tag = "Users",
    operation_id = "issueToken",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Access token issued", body = TokenResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn issue_token(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<TokenRequest>,
) -> Result<Json<TokenResponse>, ServiceError> {
    let token = state
        .referral_service
        .login(&request.email, &request.password)
        .await?;

    Ok(Json(token))
}

/// Create a referral code for the current user
#[utoipa::path(
    post,
    path = "/api/v1/users/new_referral_code",
    tag = "Referral codes",
    operation_id = "newReferralCode",
    request_body = CreateReferralCodeRequest,
    responses(
        (status = 200, description = "Referral code created", body = ReferralCodeInfo),
        (status = 400, description = "Invalid days or an active code already exists"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn new_referral_code(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(request): ValidatedJson<CreateReferralCodeRequest>,
) -> Result<Json<ReferralCodeInfo>, ServiceError> {
    let code = state
        .referral_service
        .issue_referral_code(user.id, request.days)
        .await?;

    Ok(Json(code.into()))
}

/// Deactivate the current user's active referral code
#[utoipa::path(
    post,
    path = "/api/v1/users/deactivate_referral_code",
    tag = "Referral codes",
    operation_id = "deactivateReferralCode",
    responses(
        (status = 200, description = "Referral code deactivated", body = DeactivationResponse),
        (status = 400, description = "No active referral code found"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn deactivate_referral_code(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<DeactivationResponse>, ServiceError> {
    state
        .referral_service
        .deactivate_referral_code(user.id)
        .await?;

    Ok(Json(DeactivationResponse::default()))
}

/// Look up the active referral code of a referrer by email; null when none is active
#[utoipa::path(
    post,
    path = "/api/v1/users/search_referral_code",
    tag = "Lookup",
    operation_id = "searchReferralCode",
    request_body = SearchCodeRequest,
    responses(
        (status = 200, description = "Active referral code, or null", body = ReferralCodeInfo),
        (status = 400, description = "User not found")
    )
)]
pub async fn search_referral_code(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<SearchCodeRequest>,
) -> Result<Json<Option<ReferralCodeInfo>>, ServiceError> {
    let code = state
        .referral_service
        .find_active_code_by_email(&request.email)
        .await?;

    Ok(Json(code.map(ReferralCodeInfo::from)))
}

/// List every user referred by the given referrer
#[utoipa::path(
    post,
    path = "/api/v1/users/search_referred/{referrer_id}",
    tag = "Lookup",
    operation_id = "searchReferred",
    params(
        ("referrer_id" = i64, Path, description = "ID of the referrer")
    ),
    responses(
        (status = 200, description = "Referred users", body = [UserInfo]),
        (status = 400, description = "Malformed referrer id")
    )
)]
pub async fn search_referred(
    State(state): State<AppState>,
    Path(referrer_id): Path<String>,
) -> Result<Json<Vec<UserInfo>>, ServiceError> {
    let referrer_id: i64 = referrer_id
        .parse()
        .map_err(|_| ServiceError::InvalidInput("Invalid input data.".to_string()))?;

    let users = state
        .referral_service
        .list_referred_users(referrer_id)
        .await?;

    Ok(Json(users))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_user_request_validation() {
        let valid = CreateUserRequest {
            email: "a@x.com".to_string(),
            password: "pw1".to_string(),
            referral_code: None,
        };
        assert!(valid.validate().is_ok());

        let bad_email = CreateUserRequest {
            email: "not-an-email".to_string(),
            password: "pw1".to_string(),
            referral_code: None,
        };
        assert!(bad_email.validate().is_err());

        let empty_password = CreateUserRequest {
            email: "a@x.com".to_string(),
            password: String::new(),
            referral_code: None,
        };
        assert!(empty_password.validate().is_err());
    }

    #[test]
    fn test_padded_email_is_normalized_before_validation() {
        let request: CreateUserRequest =
            serde_json::from_str(r#"{"email":" A@x.com ","password":"pw1"}"#).unwrap();
        assert_eq!(request.email, "a@x.com");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_days_must_be_positive() {
        assert!(CreateReferralCodeRequest { days: 1 }.validate().is_ok());
        assert!(CreateReferralCodeRequest { days: 0 }.validate().is_err());
        assert!(CreateReferralCodeRequest { days: -5 }.validate().is_err());
    }

    #[test]
    fn test_referral_code_is_optional_in_body() {
        let request: CreateUserRequest =
            serde_json::from_str(r#"{"email":"a@x.com","password":"pw1"}"#).unwrap();
        assert!(request.referral_code.is_none());
    }

    #[test]
    fn test_deactivation_response_message() {
        assert_eq!(
            serde_json::to_value(DeactivationResponse::default()).unwrap()["detail"],
            "The referral code has been successfully deactivated."
        );
    }
}
