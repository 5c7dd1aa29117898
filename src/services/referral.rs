// Referral lifecycle: registration, login, code issuance and deactivation
//
// Every operation that depends on the clock has an `_at` variant taking the
// observation time explicitly; the plain variants use `Utc::now()`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::models::{ReferralCode, TokenResponse, User, UserInfo};
use crate::services::jwt::JwtService;
use crate::services::short_code::ShortCodeGenerator;
use crate::store::{ReferralStore, Registration};
use crate::utils::password::{hash_password_async, verify_password_async};
use crate::utils::service_error::ServiceError;
use crate::utils::validation::{normalize_email, trim_and_validate_field, trim_optional_field};

const INVALID_CREDENTIALS: &str = "Invalid email or password.";
const INVALID_INPUT: &str = "Invalid input data.";

/// `now + days`, rejecting non-positive or unrepresentable spans
pub fn expiry_after(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, ServiceError> {
    if days < 1 {
        return Err(ServiceError::InvalidInput(INVALID_INPUT.to_string()));
    }

    Duration::try_days(days)
        .and_then(|span| now.checked_add_signed(span))
        .ok_or_else(|| ServiceError::InvalidInput(INVALID_INPUT.to_string()))
}

pub struct ReferralService {
    store: Arc<dyn ReferralStore>,
    jwt: Arc<JwtService>,
    generator: ShortCodeGenerator,
    bcrypt_cost: u32,
    default_expiration_days: i64,
}

impl ReferralService {
    pub fn new(
        store: Arc<dyn ReferralStore>,
        jwt: Arc<JwtService>,
        generator: ShortCodeGenerator,
        bcrypt_cost: u32,
        default_expiration_days: i64,
    ) -> Self {
        Self {
            store,
            jwt,
            generator,
            bcrypt_cost,
            default_expiration_days,
        }
    }

    pub fn generator(&self) -> &ShortCodeGenerator {
        &self.generator
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        referral_code: Option<&str>,
    ) -> Result<UserInfo, ServiceError> {
        self.register_at(email, password, referral_code, Utc::now())
            .await
    }

    /// Create a user with a default code, linking them to the owner of `referral_code`
    pub async fn register_at(
        &self,
        email: &str,
        password: &str,
        referral_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<UserInfo, ServiceError> {
        let email = trim_and_validate_field(&normalize_email(email), true)
            .map_err(|_| ServiceError::InvalidInput(INVALID_INPUT.to_string()))?;
        if password.is_empty() {
            return Err(ServiceError::InvalidInput(INVALID_INPUT.to_string()));
        }
        let referral_code = trim_optional_field(referral_code.map(str::to_string).as_ref());
        let code_expires_at = expiry_after(now, self.default_expiration_days)?;

        let password_hash = hash_password_async(password.to_string(), self.bcrypt_cost).await?;

        let registered = self
            .store
            .register_user(
                Registration {
                    email,
                    password_hash,
                    referral_code,
                    code_expires_at,
                    now,
                },
                &self.generator,
            )
            .await?;

        info!(
            user_id = registered.user.id,
            email = %registered.user.email,
            referrer_id = ?registered.referrer_id,
            "User registered"
        );

        Ok(UserInfo::new(&registered.user, &[registered.code]))
    }

    /// Exchange email and password for a bearer access token
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ServiceError> {
        let email = normalize_email(email);

        let Some(user) = self.store.find_user_by_email(&email).await? else {
            warn!(email = %email, reason = "unknown_email", "Authentication failure");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        };

        if !verify_password_async(password.to_string(), user.password_hash.clone()).await? {
            warn!(
                email = %email,
                user_id = user.id,
                reason = "wrong_password",
                "Authentication failure"
            );
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let token = self.jwt.generate_access_token(&user.email)?;
        info!(user_id = user.id, "Access token issued");

        Ok(TokenResponse::bearer(token))
    }

    /// The user a bearer token was issued to
    pub async fn resolve_current_user(&self, token: &str) -> Result<User, ServiceError> {
        let claims = self.jwt.validate_access_token(token).map_err(|e| {
            warn!(error = %e, "Rejected access token");
            ServiceError::from(e)
        })?;

        match self.store.find_user_by_email(&claims.sub).await? {
            Some(user) => Ok(user),
            None => {
                warn!(email = %claims.sub, "Access token subject no longer exists");
                Err(ServiceError::Unauthorized("User not found".to_string()))
            },
        }
    }

    pub async fn issue_referral_code(
        &self,
        owner_id: i64,
        days: i64,
    ) -> Result<ReferralCode, ServiceError> {
        self.issue_referral_code_at(owner_id, days, Utc::now()).await
    }

    /// Create a code expiring `days` from `now`, provided the owner has no active code
    pub async fn issue_referral_code_at(
        &self,
        owner_id: i64,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<ReferralCode, ServiceError> {
        let expires_at = expiry_after(now, days)?;

        let code = self
            .store
            .issue_code(owner_id, expires_at, now, &self.generator)
            .await?;

        info!(
            user_id = owner_id,
            code = %code.code,
            expires_at = %code.expiration_date,
            "Referral code issued"
        );
        Ok(code)
    }

    pub async fn deactivate_referral_code(
        &self,
        owner_id: i64,
    ) -> Result<ReferralCode, ServiceError> {
        self.deactivate_referral_code_at(owner_id, Utc::now()).await
    }

    /// Archive the owner's active code
    pub async fn deactivate_referral_code_at(
        &self,
        owner_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ReferralCode, ServiceError> {
        match self.store.archive_active_code(owner_id, now).await? {
            Some(code) => {
                info!(user_id = owner_id, code = %code.code, "Referral code deactivated");
                Ok(code)
            },
            None => Err(ServiceError::InvalidInput(
                "No active referral code found.".to_string(),
            )),
        }
    }

    pub async fn find_active_code_by_email(
        &self,
        email: &str,
    ) -> Result<Option<ReferralCode>, ServiceError> {
        self.find_active_code_by_email_at(email, Utc::now()).await
    }

    /// Active code of the user registered under `email`; `None` when nothing is active
    pub async fn find_active_code_by_email_at(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ReferralCode>, ServiceError> {
        let user = self
            .store
            .find_user_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| ServiceError::InvalidInput("User not found.".to_string()))?;

        Ok(self.store.find_active_code(user.id, now).await?)
    }

    /// Every user referred by `referrer_id`, each with all of their codes
    pub async fn list_referred_users(&self, referrer_id: i64) -> Result<Vec<UserInfo>, ServiceError> {
        let users = self.store.list_referred_users(referrer_id).await?;
        let codes = self.store.codes_for_users(&users).await?;

        Ok(users
            .iter()
            .zip(codes.iter())
            .map(|(user, codes)| UserInfo::new(user, codes))
            .collect())
    }
}
