pub mod jwt;
pub mod referral;
pub mod short_code;

pub use jwt::{JwtConfig, JwtError, JwtService};
pub use referral::ReferralService;
pub use short_code::{ShortCodeError, ShortCodeGenerator};
