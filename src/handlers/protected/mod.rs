// handlers/protected/mod.rs - Endpoints behind require_auth
//
// The caller's identity arrives as an `Extension<CurrentUser>`.

pub mod auth; // GET /api/v1/auth/me

pub use auth::me;
