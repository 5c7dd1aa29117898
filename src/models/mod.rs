pub mod auth;
pub mod referral_code;
pub mod user;
pub mod user_referral;

// Re-export common types
pub use auth::*;
pub use referral_code::{NewReferralCode, ReferralCode, ReferralCodeInfo};
pub use user::*;
pub use user_referral::{NewUserReferral, UserReferral};
