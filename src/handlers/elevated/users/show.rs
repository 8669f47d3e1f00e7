// handlers/elevated/users/show.rs - GET /api/v1/users/:id handler

use axum::extract::{Path, State};

use crate::api::UserResponse;
use crate::middleware::{ApiResponse, ApiResult};
use crate::router::AppState;

use super::parse_id;

pub async fn user_show(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<UserResponse> {
    let user = state.users.get(parse_id(&id)?).await?;
    Ok(ApiResponse::success(UserResponse::from(user)))
}
