// handlers/elevated/users/update.rs - PUT /api/v1/users/:id handler

use axum::extract::{Path, State};

use crate::api::{AppJson, UpdateUserRequest, UserResponse};
use crate::middleware::{ApiResponse, ApiResult};
use crate::router::AppState;

use super::parse_id;

/// Partial update of username, email, role and status
pub async fn user_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(body): AppJson<UpdateUserRequest>,
) -> ApiResult<UserResponse> {
    let user = state.users.update(parse_id(&id)?, body).await?;
    Ok(ApiResponse::success(UserResponse::from(user)).with_message("User updated"))
}
