// Referral code database model
// Activity is derived from is_archived and expiration_date at read time, never stored

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::user::User;
use crate::schema::referral_codes;

#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    Queryable,
    Selectable,
    Identifiable,
    Associations,
)]
#[diesel(belongs_to(User))]
#[diesel(table_name = referral_codes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ReferralCode {
    pub id: i64,
    pub code: String,
    pub expiration_date: DateTime<Utc>,
    pub is_archived: bool,
    pub user_id: i64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = referral_codes)]
pub struct NewReferralCode {
    pub code: String,
    pub expiration_date: DateTime<Utc>,
    pub is_archived: bool,
    pub user_id: i64,
}

/// Referral code as returned to API clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ReferralCodeInfo {
    /// The referral code itself
    pub code: String,
    /// When the code stops being usable
    pub expiration_date: DateTime<Utc>,
    /// Whether the owner deactivated the code
    pub is_archived: bool,
}

impl From<&ReferralCode> for ReferralCodeInfo {
    fn from(code: &ReferralCode) -> Self {
        Self {
            code: code.code.clone(),
            expiration_date: code.expiration_date,
            is_archived: code.is_archived,
        }
    }
}

impl From<ReferralCode> for ReferralCodeInfo {
    fn from(code: ReferralCode) -> Self {
        Self {
            code: code.code,
            expiration_date: code.expiration_date,
            is_archived: code.is_archived,
        }
    }
}

impl ReferralCode {
    /// Active iff not archived and not yet expired at `now`
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_archived && self.expiration_date > now
    }

    /// Look a code up and hold a share lock on it until the transaction ends
    pub async fn lock_by_code(
        conn: &mut AsyncPgConnection,
        value: &str,
    ) -> QueryResult<Option<Self>> {
        referral_codes::table
            .filter(referral_codes::code.eq(value))
            .select(ReferralCode::as_select())
            .for_share()
            .first(conn)
            .await
            .optional()
    }

    /// The owner's active code at `now`, if any
    pub async fn find_active_for_user(
        conn: &mut AsyncPgConnection,
        owner_id: i64,
        now: DateTime<Utc>,
    ) -> QueryResult<Option<Self>> {
        referral_codes::table
            .filter(referral_codes::user_id.eq(owner_id))
            .filter(referral_codes::is_archived.eq(false))
            .filter(referral_codes::expiration_date.gt(now))
            .order(referral_codes::expiration_date.desc())
            .select(ReferralCode::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_code: &NewReferralCode,
    ) -> QueryResult<Self> {
        diesel::insert_into(referral_codes::table)
            .values(new_code)
            .returning(ReferralCode::as_returning())
            .get_result(conn)
            .await
    }

    /// Archive a code, pinning its expiration to `now`
    pub async fn archive(
        conn: &mut AsyncPgConnection,
        code_id: i64,
        now: DateTime<Utc>,
    ) -> QueryResult<Self> {
        diesel::update(referral_codes::table.find(code_id))
            .set((
                referral_codes::expiration_date.eq(now),
                referral_codes::is_archived.eq(true),
            ))
            .returning(ReferralCode::as_returning())
            .get_result(conn)
            .await
    }

    /// All codes owned by the given users, grouped per user in the same order
    pub async fn grouped_for_users(
        conn: &mut AsyncPgConnection,
        owners: &[User],
    ) -> QueryResult<Vec<Vec<Self>>> {
        let codes = ReferralCode::belonging_to(owners)
            .order(referral_codes::id.asc())
            .select(ReferralCode::as_select())
            .load(conn)
            .await?;

        Ok(codes.grouped_by(owners))
    }
}
