pub mod auth_service;
pub mod user_service;

pub use auth_service::{AuthService, LoginResult, TokenPair};
pub use user_service::UserService;

use crate::error::AppError;

/// Run CPU-bound work (password hashing) off the async workers
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(AppError::internal)?
}
