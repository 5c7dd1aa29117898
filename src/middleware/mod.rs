// HTTP middleware: bearer authentication, throttling and CORS

pub mod auth;
pub mod cors;
pub mod rate_limit;

pub use auth::CurrentUser;
pub use cors::build_cors_layer;
pub use rate_limit::{build_rate_limiter, rate_limit_middleware, IpRateLimiter};
