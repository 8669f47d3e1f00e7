// handlers/elevated/users/mod.rs - User management handlers

use crate::error::AppError;

pub mod create;  // POST /api/v1/users
pub mod list;    // GET /api/v1/users
pub mod show;    // GET /api/v1/users/:id
pub mod update;  // PUT /api/v1/users/:id
pub mod delete;  // DELETE /api/v1/users/:id
pub mod restore; // POST /api/v1/users/:id/restore

pub use create::user_create;
pub use delete::user_delete;
pub use list::user_list;
pub use restore::user_restore;
pub use show::user_show;
pub use update::user_update;

/// Path ids are taken as strings so a non-numeric id is a BAD_REQUEST in the
/// envelope rather than axum's plain-text rejection.
pub(crate) fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("Invalid user ID: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_numeric() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert_eq!(parse_id("abc").unwrap_err().error_code(), "BAD_REQUEST");
        assert!(parse_id("").is_err());
    }
}
