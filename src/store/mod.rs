// Persistence layer for users, referral codes and referral edges
//
// Every implementation upholds the same invariants: emails and codes are unique,
// an owner has at most one active code, and registration is all-or-nothing.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{ReferralCode, User};
use crate::services::short_code::ShortCodeGenerator;

pub use memory::InMemoryReferralStore;
pub use postgres::PgReferralStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Email already registered")]
    EmailTaken,

    #[error("Referral code does not exist or is not active")]
    InvalidReferralCode,

    #[error("Owner already has an active referral code")]
    ActiveCodeExists,

    #[error("User not found")]
    UserNotFound,

    #[error("Failed to generate a unique referral code after {0} attempts")]
    CodeGenerationExhausted(usize),

    #[error("Store operation '{0}' timed out")]
    Timeout(&'static str),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}

/// Everything needed to register one user
#[derive(Debug, Clone)]
pub struct Registration {
    /// Normalized email
    pub email: String,
    pub password_hash: String,
    /// Referral code the user signed up with, already trimmed
    pub referral_code: Option<String>,
    /// Expiration of the default code created with the user
    pub code_expires_at: DateTime<Utc>,
    /// Observation time used to decide whether `referral_code` is active
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RegisteredUser {
    pub user: User,
    pub code: ReferralCode,
    pub referrer_id: Option<i64>,
}

#[async_trait]
pub trait ReferralStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Create the user, its default code and the optional referral edge atomically
    async fn register_user(
        &self,
        registration: Registration,
        generator: &ShortCodeGenerator,
    ) -> Result<RegisteredUser, StoreError>;

    /// Create a new code for an owner that has no active code at `now`
    async fn issue_code(
        &self,
        owner_id: i64,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
        generator: &ShortCodeGenerator,
    ) -> Result<ReferralCode, StoreError>;

    /// Archive the owner's active code, returning it in its archived state
    async fn archive_active_code(
        &self,
        owner_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<ReferralCode>, StoreError>;

    async fn find_active_code(
        &self,
        owner_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<ReferralCode>, StoreError>;

    /// Codes of each user, in the same order as `users`
    async fn codes_for_users(&self, users: &[User]) -> Result<Vec<Vec<ReferralCode>>, StoreError>;

    /// Users referred by `referrer_id`, in the order the edges were created
    async fn list_referred_users(&self, referrer_id: i64) -> Result<Vec<User>, StoreError>;

    async fn delete_user(&self, user_id: i64) -> Result<bool, StoreError>;

    async fn health_check(&self) -> bool;
}
