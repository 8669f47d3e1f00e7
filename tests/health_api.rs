mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use account_api::config::AppConfig;
use common::TestServer;

#[tokio::test]
async fn health_is_static_and_unauthenticated() -> Result<()> {
    let server = TestServer::start().await?;

    let resp = server.client.get(server.url("/health")).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.json::<Value>().await?, json!({ "status": "ok" }));

    Ok(())
}

#[tokio::test]
async fn rate_limit_rejects_after_threshold() -> Result<()> {
    let server = TestServer::start_with(AppConfig::development(), Some(2)).await?;
    let logout = server.url("/api/v1/auth/logout");

    let first = server.client.post(&logout).send().await?;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()["x-ratelimit-limit"], "2");
    assert_eq!(first.headers()["x-ratelimit-remaining"], "1");

    let second = server.client.post(&logout).send().await?;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers()["x-ratelimit-remaining"], "0");

    let third = server.client.post(&logout).send().await?;
    assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = third.json().await?;
    assert_eq!(body["error"]["code"], "TOO_MANY_REQUESTS");

    // Health is outside the limiter
    let health = server.client.get(server.url("/health")).send().await?;
    assert_eq!(health.status(), StatusCode::OK);

    Ok(())
}
