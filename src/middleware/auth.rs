use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use crate::auth::{Claims, TokenKind};
use crate::database::models::UserRole;
use crate::error::AppError;
use crate::router::AppState;
use crate::services::TokenPair;

pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

/// Authenticated caller, inserted into request extensions by [`require_auth`]
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub user_id: i64,
    pub username: String,
    pub role: UserRole,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            role: claims.role,
        }
    }
}

/// Establish the caller's identity from the access token.
///
/// A missing or failing access token falls back to the refresh token; when
/// that validates, a new access/refresh pair is minted and sent back as
/// cookies. Any failure clears both cookies and answers 401.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let access = bearer_token(request.headers()).or_else(|| state.cookies.access_token(&jar));

    let validated = match access.as_deref().map(|token| state.auth.validate(token)) {
        Some(Ok(claims)) => Some((claims, None)),
        Some(Err(e)) => {
            debug!(path = %request.uri().path(), error = %e, "access token rejected, trying refresh");
            try_refresh(&state, &jar, request.headers())
        }
        None => {
            debug!(path = %request.uri().path(), "no access token, trying refresh");
            try_refresh(&state, &jar, request.headers())
        }
    };

    let Some((claims, refreshed)) = validated else {
        return (
            state.cookies.clear(jar),
            AppError::unauthorized("Authentication required"),
        )
            .into_response();
    };

    request.extensions_mut().insert(CurrentUser::from(claims));
    let response = next.run(request).await;

    match refreshed {
        Some(pair) => {
            let tokens = state.auth.tokens();
            let jar = state.cookies.set_tokens(
                jar,
                pair.access_token,
                tokens.ttl(TokenKind::Access),
                pair.refresh_token,
                tokens.ttl(TokenKind::Refresh),
            );
            (jar, response).into_response()
        }
        None => response,
    }
}

fn try_refresh(state: &AppState, jar: &CookieJar, headers: &HeaderMap) -> Option<(Claims, Option<TokenPair>)> {
    let token = headers
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| state.cookies.refresh_token(jar))?;

    match state.auth.refresh(&token) {
        Ok((claims, pair)) => {
            debug!(user_id = claims.user_id, "session refreshed");
            Some((claims, Some(pair)))
        }
        Err(e) => {
            debug!(error = %e, "refresh token rejected");
            None
        }
    }
}

/// Gate for administrative routes; must run inside [`require_auth`]
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    if !user.role.is_admin() {
        debug!(user_id = user.user_id, role = %user.role, "admin route refused");
        return Err(AppError::forbidden("Insufficient permissions"));
    }

    Ok(next.run(request).await)
}

/// Extract a bearer token from the `Authorization` header
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def.ghi"));

        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
