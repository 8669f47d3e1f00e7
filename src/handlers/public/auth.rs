// handlers/public/auth.rs - POST /api/v1/auth/login and /api/v1/auth/logout

use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;

use crate::api::{AppJson, LoginRequest, LoginResponse, UserResponse};
use crate::auth::TokenKind;
use crate::error::AppError;
use crate::middleware::response::{ApiResponse, FieldError};
use crate::router::AppState;

/**
 * POST /api/v1/auth/login - Exchange credentials for a session
 *
 * Input: `{"username": "...", "password": "..."}`
 *
 * Both tokens are returned in the body and also set as HTTP-only cookies,
 * each cookie living exactly as long as its token.
 */
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(body): AppJson<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<LoginResponse>), AppError> {
    let mut missing = Vec::new();
    if body.username.is_empty() {
        missing.push(FieldError::new("username", "is required"));
    }
    if body.password.is_empty() {
        missing.push(FieldError::new("password", "is required"));
    }
    if !missing.is_empty() {
        return Err(AppError::validation("Validation failed", missing));
    }

    let result = state.auth.login(&body.username, &body.password).await?;

    let tokens = state.auth.tokens();
    let jar = state.cookies.set_tokens(
        jar,
        result.tokens.access_token.clone(),
        tokens.ttl(TokenKind::Access),
        result.tokens.refresh_token.clone(),
        tokens.ttl(TokenKind::Refresh),
    );

    let response = LoginResponse {
        user: UserResponse::from(&result.user),
        access_token: result.tokens.access_token,
        refresh_token: result.tokens.refresh_token,
    };

    Ok((jar, ApiResponse::success(response).with_message("Login successful")))
}

/// POST /api/v1/auth/logout - Clear both token cookies.
///
/// Stateless: tokens issued earlier stay valid until they expire.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, ApiResponse<()>) {
    (state.cookies.clear(jar), ApiResponse::message_only("Logout successful"))
}
