// handlers/elevated/users/restore.rs - POST /api/v1/users/:id/restore handler

use axum::extract::{Path, State};

use crate::api::UserResponse;
use crate::middleware::{ApiResponse, ApiResult};
use crate::router::AppState;

use super::parse_id;

/// Bring back a soft-deleted user; USER_NOT_FOUND unless it is deleted
pub async fn user_restore(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<UserResponse> {
    let user = state.users.restore(parse_id(&id)?).await?;
    Ok(ApiResponse::success(UserResponse::from(user)).with_message("User restored"))
}
