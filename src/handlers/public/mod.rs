// handlers/public/mod.rs - Endpoints that need no session
//
// Login and logout sit here: login is how a session starts, and logout must
// work with an expired or missing token so the client can always clear cookies.

pub mod auth;   // POST /api/v1/auth/login, POST /api/v1/auth/logout
pub mod health; // GET /health

pub use auth::{login, logout};
pub use health::health;
