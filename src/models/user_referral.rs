// Directed referrer -> referred edge, written once at registration

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::schema::user_referrals;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = user_referrals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserReferral {
    pub id: i64,
    pub referrer_id: i64,
    pub referred_id: i64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_referrals)]
pub struct NewUserReferral {
    pub referrer_id: i64,
    pub referred_id: i64,
}

impl UserReferral {
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_referral: &NewUserReferral,
    ) -> QueryResult<Self> {
        diesel::insert_into(user_referrals::table)
            .values(new_referral)
            .returning(UserReferral::as_returning())
            .get_result(conn)
            .await
    }
}
