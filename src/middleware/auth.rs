// Bearer authentication for protected routes
// Resolves the token's subject to a stored user before the handler runs

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::{app::AppState, models::User, utils::service_error::ServiceError};

/// The user a valid bearer token belongs to
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    tracing::warn!(path = %parts.uri.path(), "Missing or malformed bearer token");
                    ServiceError::Unauthorized("Not authenticated".to_string())
                })?;

        let user = state
            .referral_service
            .resolve_current_user(bearer.token())
            .await?;

        Ok(CurrentUser(user))
    }
}
