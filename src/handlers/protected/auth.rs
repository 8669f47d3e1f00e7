// handlers/protected/auth.rs - GET /api/v1/auth/me handler

use axum::extract::{Extension, State};

use crate::api::UserResponse;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::router::AppState;

/// The authenticated user, re-read from the store
pub async fn me(State(state): State<AppState>, Extension(current): Extension<CurrentUser>) -> ApiResult<UserResponse> {
    let user = state.auth.current_user(current.user_id).await?;
    Ok(ApiResponse::success(UserResponse::from(user)))
}
