use std::any::Any;
use std::sync::Arc;

use axum::{
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, warn};

use crate::auth::{cookie::CookieSettings, PasswordHasher, TokenService};
use crate::config::{AppConfig, CorsConfig};
use crate::database::UserRepository;
use crate::error::panic_response_body;
use crate::handlers;
use crate::middleware::{auth::REFRESH_TOKEN_HEADER, log_errors, rate_limit, require_admin, require_auth, RateLimiter};
use crate::services::{AuthService, UserService};

/// Everything a request needs, built once at startup and cloned per request
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: AuthService,
    pub users: UserService,
    pub cookies: CookieSettings,
    pub rate_limiter: Option<RateLimiter>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserRepository>,
        hasher: PasswordHasher,
        rate_limiter: Option<RateLimiter>,
    ) -> Self {
        let tokens = TokenService::new(&config.jwt);
        Self {
            auth: AuthService::new(users.clone(), tokens, hasher.clone()),
            users: UserService::new(users, hasher),
            cookies: CookieSettings::new(config.cookie.clone()),
            config: Arc::new(config),
            rate_limiter,
        }
    }
}

/// The full application: `/health` plus everything under `/api/v1`
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth_public_routes())
        .merge(auth_routes(state.clone()))
        .merge(user_routes(state.clone()));

    Router::new()
        .nest("/api/v1", api)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(middleware::from_fn(log_errors))
        .layer(TraceLayer::new_for_http())
        // Added after the layers above so health checks are neither traced nor limited
        .route("/health", get(handlers::public::health))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors_layer(&state.config.cors))
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use handlers::public;

    Router::new()
        .route("/auth/login", post(public::login))
        .route("/auth/logout", post(public::logout))
}

fn auth_routes(state: AppState) -> Router<AppState> {
    use handlers::protected;

    Router::new()
        .route("/auth/me", get(protected::me))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

fn user_routes(state: AppState) -> Router<AppState> {
    use handlers::elevated;

    Router::new()
        .route("/users", get(elevated::user_list).post(elevated::user_create))
        .route(
            "/users/:id",
            get(elevated::user_show)
                .put(elevated::user_update)
                .delete(elevated::user_delete),
        )
        .route("/users/:id/restore", post(elevated::user_restore))
        // Last layer runs first: authenticate, then check the role
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// Credentialed CORS; `*` mirrors the request origin since browsers refuse a
/// literal wildcard together with cookies.
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = if config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring malformed CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(REFRESH_TOKEN_HEADER),
        ])
        .expose_headers([
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("x-ratelimit-remaining"),
        ])
        .allow_credentials(true)
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!(panic = %detail, "handler panicked");

    (StatusCode::INTERNAL_SERVER_ERROR, Json(panic_response_body())).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::testing::memory_state;
    use axum::{body::Body, extract::Request};
    use tower::ServiceExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (state, _) = memory_state(AppConfig::development(), None);
        let response = app(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn admin_routes_require_a_session() {
        let (state, _) = memory_state(AppConfig::development(), None);
        let response = app(state)
            .oneshot(Request::builder().uri("/api/v1/users").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["is_success"], false);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn panics_become_internal_errors() {
        async fn boom() -> &'static str {
            panic!("kaboom")
        }

        let app: Router = Router::new()
            .route("/boom", get(boom))
            .layer(CatchPanicLayer::custom(handle_panic));

        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert!(!body.to_string().contains("kaboom"));
    }
}
