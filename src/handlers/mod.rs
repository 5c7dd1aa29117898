// HTTP handlers and route builders

pub mod docs;
pub mod extract;
pub mod health;
pub mod users;

use crate::app::AppState;
use axum::{routing::post, Router};

// User and referral code routes, nested under /api/v1/users
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(users::create_user))
        .route("/token", post(users::issue_token))
        .route("/new_referral_code", post(users::new_referral_code))
        .route(
            "/deactivate_referral_code",
            post(users::deactivate_referral_code),
        )
        .route("/search_referral_code", post(users::search_referral_code))
        .route("/search_referred/{referrer_id}", post(users::search_referred))
}
