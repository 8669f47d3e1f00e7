pub mod auth;
pub mod logging;
pub mod rate_limit;
pub mod response;

pub use auth::{require_admin, require_auth, CurrentUser};
pub use logging::log_errors;
pub use rate_limit::{rate_limit, RateLimiter};
pub use response::{ApiResponse, ApiResult};
