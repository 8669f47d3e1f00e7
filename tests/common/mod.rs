#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{header::SET_COOKIE, StatusCode};
use serde_json::{json, Value};

use account_api::{
    app,
    config::AppConfig,
    database::models::{User, UserRole},
    testing::{fast_hasher, memory_state, seed_user, MemoryUserRepository},
};

pub const ADMIN_PASSWORD: &str = "admin-password";
pub const USER_PASSWORD: &str = "user-password";

/// The real router over in-memory adapters, served on a free local port.
///
/// Each test gets its own server: the server task lives on the test's runtime.
pub struct TestServer {
    pub base_url: String,
    pub users: Arc<MemoryUserRepository>,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(AppConfig::development(), None).await
    }

    pub async fn start_with(config: AppConfig, rate_limit: Option<u64>) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let addr = SocketAddr::from(([127, 0, 0, 1], port));

        let (state, users) = memory_state(config, rate_limit);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        tokio::spawn(async move {
            let _ = axum::serve(
                listener,
                app(state).into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await;
        });

        let server = Self {
            base_url: format!("http://{}", addr),
            users,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn seed(&self, username: &str, password: &str, role: UserRole) -> Result<User> {
        seed_user(self.users.as_ref(), &fast_hasher(), username, password, role).await
    }

    pub async fn login_response(&self, username: &str, password: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(self.url("/api/v1/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?)
    }

    /// Log in and return the `data` member of the envelope
    pub async fn login(&self, username: &str, password: &str) -> Result<Value> {
        let resp = self.login_response(username, password).await?;
        anyhow::ensure!(resp.status() == StatusCode::OK, "login failed: {}", resp.status());
        let body: Value = resp.json().await?;
        Ok(body["data"].clone())
    }

    /// Seed an ADMIN and return its access token
    pub async fn admin_token(&self) -> Result<String> {
        self.seed("root-admin", ADMIN_PASSWORD, UserRole::Admin).await?;
        let data = self.login("root-admin", ADMIN_PASSWORD).await?;
        data["access_token"]
            .as_str()
            .map(str::to_string)
            .context("login response had no access_token")
    }
}

/// Raw `Set-Cookie` header values of a response
pub fn set_cookies(resp: &reqwest::Response) -> Vec<String> {
    resp.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// The `Set-Cookie` value for `name`, if the response set it
pub fn set_cookie<'a>(cookies: &'a [String], name: &str) -> Option<&'a str> {
    let prefix = format!("{}=", name);
    cookies.iter().map(String::as_str).find(|c| c.starts_with(&prefix))
}

/// Value part of a `Set-Cookie` line
pub fn cookie_value(set_cookie: &str) -> &str {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value)
        .unwrap_or_default()
}
