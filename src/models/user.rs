// User database model

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::referral_code::{ReferralCode, ReferralCodeInfo};
use crate::schema::{user_referrals, users};

/// User database model - queryable from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// New user for insertion
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
}

/// Public view of a user together with every referral code they own
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct UserInfo {
    pub id: i64,
    pub email: String,
    pub referral_code: Vec<ReferralCodeInfo>,
}

impl UserInfo {
    pub fn new(user: &User, codes: &[ReferralCode]) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            referral_code: codes.iter().map(ReferralCodeInfo::from).collect(),
        }
    }
}

impl User {
    /// Find user by (already normalized) email
    pub async fn find_by_email(
        conn: &mut AsyncPgConnection,
        email: &str,
    ) -> QueryResult<Option<Self>> {
        users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// Lock the user row for the rest of the surrounding transaction
    pub async fn lock_for_update(
        conn: &mut AsyncPgConnection,
        user_id: i64,
    ) -> QueryResult<Option<Self>> {
        users::table
            .find(user_id)
            .select(User::as_select())
            .for_update()
            .first(conn)
            .await
            .optional()
    }

    /// Create a new user
    pub async fn create(conn: &mut AsyncPgConnection, new_user: &NewUser) -> QueryResult<Self> {
        diesel::insert_into(users::table)
            .values(new_user)
            .returning(User::as_returning())
            .get_result(conn)
            .await
    }

    /// Delete a user; codes and referral edges go with it
    pub async fn delete(conn: &mut AsyncPgConnection, user_id: i64) -> QueryResult<bool> {
        let deleted = diesel::delete(users::table.find(user_id))
            .execute(conn)
            .await?;
        Ok(deleted > 0)
    }

    /// Users linked as referred to the given referrer, in insertion order
    pub async fn referred_by(
        conn: &mut AsyncPgConnection,
        referrer: i64,
    ) -> QueryResult<Vec<Self>> {
        users::table
            .inner_join(user_referrals::table.on(user_referrals::referred_id.eq(users::id)))
            .filter(user_referrals::referrer_id.eq(referrer))
            .order(user_referrals::id.asc())
            .select(User::as_select())
            .load(conn)
            .await
    }
}
