// Service error taxonomy and its HTTP mapping
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::services::jwt::JwtError;
use crate::store::StoreError;
use crate::utils::password::PasswordError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            // Uniqueness violations surface as plain bad requests
            ServiceError::Conflict(_) => StatusCode::BAD_REQUEST,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            ServiceError::InvalidInput(msg)
            | ServiceError::Unauthorized(msg)
            | ServiceError::Conflict(msg)
            | ServiceError::Internal(msg)
            | ServiceError::Unavailable(msg) => msg,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = Json(json!({
            "detail": self.detail(),
            "status": status.as_u16()
        }));

        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

// Conversion from various error types
impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::EmailTaken => {
                ServiceError::Conflict("A user with this email is already registered.".to_string())
            },
            StoreError::InvalidReferralCode => {
                ServiceError::InvalidInput("Invalid referral code.".to_string())
            },
            StoreError::ActiveCodeExists => ServiceError::Conflict(
                "The user already has an active referral code.".to_string(),
            ),
            StoreError::UserNotFound => ServiceError::InvalidInput("User not found.".to_string()),
            StoreError::CodeGenerationExhausted(attempts) => {
                error!(attempts, "Referral code generation exhausted its retry budget");
                ServiceError::Internal("Failed to create a unique referral code.".to_string())
            },
            StoreError::Timeout(operation) => {
                ServiceError::Unavailable(format!("Storage timed out during {}", operation))
            },
            StoreError::Pool(msg) => {
                error!(error = %msg, "Storage unavailable");
                ServiceError::Unavailable("Storage is unavailable".to_string())
            },
            StoreError::Database(e) => {
                error!(error = %e, "Database error");
                ServiceError::Internal("Internal server error".to_string())
            },
        }
    }
}

impl From<JwtError> for ServiceError {
    fn from(error: JwtError) -> Self {
        match error {
            JwtError::TokenExpired | JwtError::InvalidToken => {
                ServiceError::Unauthorized("Could not validate credentials".to_string())
            },
            JwtError::EncodingError(msg) | JwtError::KeyGenerationError(msg) => {
                error!(error = %msg, "Token signing failed");
                ServiceError::Internal("Failed to issue access token".to_string())
            },
        }
    }
}

impl From<PasswordError> for ServiceError {
    fn from(error: PasswordError) -> Self {
        error!(error = %error, "Password hashing failed");
        ServiceError::Internal("Internal server error".to_string())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(_error: validator::ValidationErrors) -> Self {
        ServiceError::InvalidInput("Invalid input data.".to_string())
    }
}
