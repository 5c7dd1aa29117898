// Postgres store over diesel-async
// Uniqueness comes from table constraints; multi-row writes run in one transaction

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bb8::PooledConnection;
use chrono::{DateTime, Utc};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use tracing::{error, info, warn};

use super::{ReferralStore, RegisteredUser, Registration, StoreError};
use crate::db::{check_diesel_health, DieselPool};
use crate::models::{
    NewReferralCode, NewUser, NewUserReferral, ReferralCode, User, UserReferral,
};
use crate::services::short_code::ShortCodeGenerator;

const USERS_EMAIL_KEY: &str = "users_email_key";
const REFERRAL_CODES_CODE_KEY: &str = "referral_codes_code_key";

type PgPooledConnection<'a> =
    PooledConnection<'a, AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Name of the unique constraint a failed statement violated, if any
fn unique_violation(err: &DieselError) -> Option<String> {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => Some(
            info.constraint_name()
                .map(str::to_string)
                .unwrap_or_default(),
        ),
        _ => None,
    }
}

/// Insert a fresh code for `owner_id`, retrying collisions inside savepoints
async fn insert_unique_code(
    conn: &mut AsyncPgConnection,
    owner_id: i64,
    expires_at: DateTime<Utc>,
    generator: &ShortCodeGenerator,
) -> Result<ReferralCode, StoreError> {
    for attempt in 1..=generator.max_attempts() {
        let candidate = generator.generate_candidate();
        let new_code = NewReferralCode {
            code: candidate.clone(),
            expiration_date: expires_at,
            is_archived: false,
            user_id: owner_id,
        };

        let inserted = conn
            .transaction::<_, DieselError, _>(|conn| {
                Box::pin(async move { ReferralCode::create(conn, &new_code).await })
            })
            .await;

        match inserted {
            Ok(code) => return Ok(code),
            Err(e) => match unique_violation(&e) {
                Some(constraint)
                    if constraint.is_empty() || constraint == REFERRAL_CODES_CODE_KEY =>
                {
                    generator.record_collision(&candidate, attempt);
                },
                _ => return Err(StoreError::Database(e)),
            },
        }
    }

    Err(StoreError::CodeGenerationExhausted(generator.max_attempts()))
}

#[derive(Clone)]
pub struct PgReferralStore {
    pool: DieselPool,
    query_timeout: Duration,
}

impl PgReferralStore {
    pub fn new(pool: DieselPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    async fn conn(&self) -> Result<PgPooledConnection<'_>, StoreError> {
        self.pool.get().await.map_err(|e| {
            error!(error = %e, "Failed to check out database connection");
            StoreError::Pool(e.to_string())
        })
    }

    /// Bound a store call by the configured query timeout
    async fn with_timeout<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    operation,
                    timeout_ms = self.query_timeout.as_millis() as u64,
                    "Store call timed out"
                );
                Err(StoreError::Timeout(operation))
            },
        }
    }
}

#[async_trait]
impl ReferralStore for PgReferralStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.with_timeout("find_user_by_email", async {
            let mut conn = self.conn().await?;
            Ok(User::find_by_email(&mut conn, email).await?)
        })
        .await
    }

    async fn register_user(
        &self,
        registration: Registration,
        generator: &ShortCodeGenerator,
    ) -> Result<RegisteredUser, StoreError> {
        let generator = generator.clone();

        self.with_timeout("register_user", async move {
            let mut conn = self.conn().await?;

            let Registration {
                email,
                password_hash,
                referral_code,
                code_expires_at,
                now,
            } = registration;

            conn.build_transaction()
                .run::<_, StoreError, _>(|conn| {
                    Box::pin(async move {
                        // The share lock blocks a concurrent archive until this registration commits
                        let referrer_id = match referral_code.as_deref() {
                            Some(value) => match ReferralCode::lock_by_code(conn, value).await? {
                                Some(code) if code.is_active_at(now) => Some(code.user_id),
                                _ => return Err(StoreError::InvalidReferralCode),
                            },
                            None => None,
                        };

                        let new_user = NewUser {
                            email,
                            password_hash,
                        };
                        let user = User::create(conn, &new_user).await.map_err(|e| {
                            match unique_violation(&e) {
                                Some(constraint)
                                    if constraint.is_empty() || constraint == USERS_EMAIL_KEY =>
                                {
                                    StoreError::EmailTaken
                                },
                                _ => StoreError::Database(e),
                            }
                        })?;

                        let code =
                            insert_unique_code(conn, user.id, code_expires_at, &generator).await?;

                        if let Some(referrer_id) = referrer_id {
                            UserReferral::create(
                                conn,
                                &NewUserReferral {
                                    referrer_id,
                                    referred_id: user.id,
                                },
                            )
                            .await?;
                        }

                        info!(
                            user_id = user.id,
                            code = %code.code,
                            referrer_id = ?referrer_id,
                            "Registered user"
                        );

                        Ok(RegisteredUser {
                            user,
                            code,
                            referrer_id,
                        })
                    })
                })
                .await
        })
        .await
    }

    async fn issue_code(
        &self,
        owner_id: i64,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
        generator: &ShortCodeGenerator,
    ) -> Result<ReferralCode, StoreError> {
        let generator = generator.clone();

        self.with_timeout("issue_code", async move {
            let mut conn = self.conn().await?;

            conn.build_transaction()
                .run::<_, StoreError, _>(|conn| {
                    Box::pin(async move {
                        // The owner row lock serializes concurrent issuers for the same user
                        User::lock_for_update(conn, owner_id)
                            .await?
                            .ok_or(StoreError::UserNotFound)?;

                        if ReferralCode::find_active_for_user(conn, owner_id, now)
                            .await?
                            .is_some()
                        {
                            return Err(StoreError::ActiveCodeExists);
                        }

                        insert_unique_code(conn, owner_id, expires_at, &generator).await
                    })
                })
                .await
        })
        .await
    }

    async fn archive_active_code(
        &self,
        owner_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<ReferralCode>, StoreError> {
        self.with_timeout("archive_active_code", async move {
            let mut conn = self.conn().await?;

            conn.build_transaction()
                .run::<_, StoreError, _>(|conn| {
                    Box::pin(async move {
                        if User::lock_for_update(conn, owner_id).await?.is_none() {
                            return Ok(None);
                        }

                        match ReferralCode::find_active_for_user(conn, owner_id, now).await? {
                            Some(active) => {
                                Ok(Some(ReferralCode::archive(conn, active.id, now).await?))
                            },
                            None => Ok(None),
                        }
                    })
                })
                .await
        })
        .await
    }

    async fn find_active_code(
        &self,
        owner_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<ReferralCode>, StoreError> {
        self.with_timeout("find_active_code", async {
            let mut conn = self.conn().await?;
            Ok(ReferralCode::find_active_for_user(&mut conn, owner_id, now).await?)
        })
        .await
    }

    async fn codes_for_users(&self, users: &[User]) -> Result<Vec<Vec<ReferralCode>>, StoreError> {
        if users.is_empty() {
            return Ok(Vec::new());
        }

        self.with_timeout("codes_for_users", async {
            let mut conn = self.conn().await?;
            Ok(ReferralCode::grouped_for_users(&mut conn, users).await?)
        })
        .await
    }

    async fn list_referred_users(&self, referrer_id: i64) -> Result<Vec<User>, StoreError> {
        self.with_timeout("list_referred_users", async {
            let mut conn = self.conn().await?;
            Ok(User::referred_by(&mut conn, referrer_id).await?)
        })
        .await
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool, StoreError> {
        self.with_timeout("delete_user", async {
            let mut conn = self.conn().await?;
            let deleted = User::delete(&mut conn, user_id).await?;
            if deleted {
                warn!(user_id, "Deleted user and dependent rows");
            }
            Ok(deleted)
        })
        .await
    }

    async fn health_check(&self) -> bool {
        match tokio::time::timeout(self.query_timeout, check_diesel_health(&self.pool)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(error = %e, "Database health check failed");
                false
            },
            Err(_) => {
                error!("Database health check timed out");
                false
            },
        }
    }
}
