// Authentication models
// Access tokens identify their holder by email in `sub`

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Claims carried by a bearer access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    /// Subject: the holder's normalized email
    pub sub: String,

    /// Unique token identifier (UUID)
    pub jti: String,

    pub aud: String,

    pub iss: String,

    /// Issued at (Unix epoch seconds)
    pub iat: u64,

    /// Expires at (Unix epoch seconds)
    pub exp: u64,
}

impl AccessTokenClaims {
    pub fn new(
        email: String,
        token_id: String,
        audience: String,
        issuer: String,
        issued_at: u64,
        expires_at: u64,
    ) -> Self {
        Self {
            sub: email,
            jti: token_id,
            aud: audience,
            iss: issuer,
            iat: issued_at,
            exp: expires_at,
        }
    }
}

/// Response body of a successful login
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always "Bearer"
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
        }
    }
}
