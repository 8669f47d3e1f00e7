// handlers/elevated/mod.rs - Administrative endpoints
//
// Routes here run behind require_auth and then require_admin; only ADMIN and
// SYSTEM_ADMIN callers reach them.

pub mod users; // /api/v1/users[/:id[/restore]]

pub use users::*;
