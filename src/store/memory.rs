// In-process store
// A single mutex guards all tables, so every operation is serialized and atomic

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{ReferralStore, RegisteredUser, Registration, StoreError};
use crate::models::{ReferralCode, User, UserReferral};
use crate::services::short_code::{ShortCodeError, ShortCodeGenerator};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    codes: Vec<ReferralCode>,
    referrals: Vec<UserReferral>,
    next_user_id: i64,
    next_code_id: i64,
    next_referral_id: i64,
}

impl Tables {
    fn active_code(&self, owner_id: i64, now: DateTime<Utc>) -> Option<&ReferralCode> {
        self.codes
            .iter()
            .filter(|c| c.user_id == owner_id && c.is_active_at(now))
            .max_by_key(|c| c.expiration_date)
    }

    fn code_taken(&self, candidate: &str) -> bool {
        self.codes.iter().any(|c| c.code == candidate)
    }

    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn unique_code(&self, generator: &ShortCodeGenerator) -> Result<String, StoreError> {
        generator
            .generate_unique(|candidate| self.code_taken(candidate))
            .map_err(|e| match e {
                ShortCodeError::MaxRetriesExceeded(n) => StoreError::CodeGenerationExhausted(n),
                ShortCodeError::InvalidMaxAttempts => StoreError::CodeGenerationExhausted(0),
            })
    }

    fn push_code(&mut self, owner_id: i64, code: String, expires_at: DateTime<Utc>) -> ReferralCode {
        let record = ReferralCode {
            id: Self::next_id(&mut self.next_code_id),
            code,
            expiration_date: expires_at,
            is_archived: false,
            user_id: owner_id,
        };
        self.codes.push(record.clone());
        record
    }
}

#[derive(Debug, Default)]
pub struct InMemoryReferralStore {
    tables: Mutex<Tables>,
}

impl InMemoryReferralStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of referral edges recorded so far
    pub async fn referral_count(&self) -> usize {
        self.tables.lock().await.referrals.len()
    }

    /// Every code ever created, archived ones included
    pub async fn all_codes(&self) -> Vec<ReferralCode> {
        self.tables.lock().await.codes.clone()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.lock().await.users.len()
    }
}

#[async_trait]
impl ReferralStore for InMemoryReferralStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn register_user(
        &self,
        registration: Registration,
        generator: &ShortCodeGenerator,
    ) -> Result<RegisteredUser, StoreError> {
        let mut tables = self.tables.lock().await;

        // Validate everything before the first write so a failure leaves no trace
        let referrer_id = match registration.referral_code.as_deref() {
            Some(value) => match tables.codes.iter().find(|c| c.code == value) {
                Some(code) if code.is_active_at(registration.now) => Some(code.user_id),
                _ => return Err(StoreError::InvalidReferralCode),
            },
            None => None,
        };

        if tables.users.iter().any(|u| u.email == registration.email) {
            return Err(StoreError::EmailTaken);
        }

        let code_value = tables.unique_code(generator)?;

        let user = User {
            id: Tables::next_id(&mut tables.next_user_id),
            email: registration.email,
            password_hash: registration.password_hash,
        };
        tables.users.push(user.clone());

        let code = tables.push_code(user.id, code_value, registration.code_expires_at);

        if let Some(referrer_id) = referrer_id {
            let edge = UserReferral {
                id: Tables::next_id(&mut tables.next_referral_id),
                referrer_id,
                referred_id: user.id,
            };
            tables.referrals.push(edge);
        }

        info!(user_id = user.id, code = %code.code, "Registered user in memory store");

        Ok(RegisteredUser {
            user,
            code,
            referrer_id,
        })
    }

    async fn issue_code(
        &self,
        owner_id: i64,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
        generator: &ShortCodeGenerator,
    ) -> Result<ReferralCode, StoreError> {
        let mut tables = self.tables.lock().await;

        if !tables.users.iter().any(|u| u.id == owner_id) {
            return Err(StoreError::UserNotFound);
        }
        if tables.active_code(owner_id, now).is_some() {
            return Err(StoreError::ActiveCodeExists);
        }

        let code_value = tables.unique_code(generator)?;
        Ok(tables.push_code(owner_id, code_value, expires_at))
    }

    async fn archive_active_code(
        &self,
        owner_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<ReferralCode>, StoreError> {
        let mut tables = self.tables.lock().await;

        let Some(active_id) = tables.active_code(owner_id, now).map(|c| c.id) else {
            return Ok(None);
        };

        let archived = tables.codes.iter_mut().find(|c| c.id == active_id).map(|code| {
            code.expiration_date = now;
            code.is_archived = true;
            code.clone()
        });

        debug!(user_id = owner_id, "Archived referral code in memory store");
        Ok(archived)
    }

    async fn find_active_code(
        &self,
        owner_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<ReferralCode>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.active_code(owner_id, now).cloned())
    }

    async fn codes_for_users(&self, users: &[User]) -> Result<Vec<Vec<ReferralCode>>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(users
            .iter()
            .map(|user| {
                tables
                    .codes
                    .iter()
                    .filter(|c| c.user_id == user.id)
                    .cloned()
                    .collect()
            })
            .collect())
    }

    async fn list_referred_users(&self, referrer_id: i64) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .referrals
            .iter()
            .filter(|edge| edge.referrer_id == referrer_id)
            .filter_map(|edge| tables.users.iter().find(|u| u.id == edge.referred_id))
            .cloned()
            .collect())
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;

        let before = tables.users.len();
        tables.users.retain(|u| u.id != user_id);
        if tables.users.len() == before {
            return Ok(false);
        }

        tables.codes.retain(|c| c.user_id != user_id);
        tables
            .referrals
            .retain(|r| r.referrer_id != user_id && r.referred_id != user_id);
        Ok(true)
    }

    async fn health_check(&self) -> bool {
        true
    }
}
