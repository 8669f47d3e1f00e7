// handlers/elevated/users/create.rs - POST /api/v1/users handler

use axum::extract::State;

use crate::api::{AppJson, CreateUserRequest, UserResponse};
use crate::middleware::{ApiResponse, ApiResult};
use crate::router::AppState;

/**
 * POST /api/v1/users - Create an account
 *
 * Input: `{"username", "email", "password", "role"?}`; role defaults to USER
 * and the account starts ACTIVE. Responds 201 with the new user.
 */
pub async fn user_create(
    State(state): State<AppState>,
    AppJson(body): AppJson<CreateUserRequest>,
) -> ApiResult<UserResponse> {
    let user = state.users.create(body).await?;
    Ok(ApiResponse::created(UserResponse::from(user)).with_message("User created"))
}
