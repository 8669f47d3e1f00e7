// handlers/elevated/users/delete.rs - DELETE /api/v1/users/:id handler

use axum::extract::{Path, State};

use crate::middleware::{ApiResponse, ApiResult};
use crate::router::AppState;

use super::parse_id;

/// Soft delete; 204 with no body
pub async fn user_delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.users.delete(parse_id(&id)?).await?;
    Ok(ApiResponse::no_content())
}
