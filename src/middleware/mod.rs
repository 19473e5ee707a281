pub mod auth;
pub mod rate_limit;

pub use auth::{Authenticate, RequireAnonymous, RequireRole, TryAuthenticate};
pub use rate_limit::RateLimit;
