use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::filter::FilterError;

const USERNAME_CONSTRAINT: &str = "users_username_key";
const EMAIL_CONSTRAINT: &str = "users_email_key";

/// Errors from the user store. Raw driver errors stay inside `Database`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("username already taken")]
    UsernameTaken,

    #[error("email already taken")]
    EmailTaken,

    #[error("unique constraint violated: {0}")]
    Duplicate(String),

    #[error(transparent)]
    InvalidFilter(#[from] FilterError),

    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => match db.constraint() {
                Some(USERNAME_CONSTRAINT) => StoreError::UsernameTaken,
                Some(EMAIL_CONSTRAINT) => StoreError::EmailTaken,
                other => StoreError::Duplicate(other.unwrap_or("unknown").to_string()),
            },
            _ => StoreError::Database(err),
        }
    }
}

/// Connection pool construction and schema migration
pub struct DatabaseManager;

impl DatabaseManager {
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(url)
            .await
            .with_context(|| format!("failed to connect to {}", redact(url)))?;

        info!(
            database = %redact(url),
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Database connection established"
        );
        Ok(pool)
    }

    pub async fn migrate(pool: &PgPool) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .context("failed to run database migrations")?;
        info!("Database migrations applied");
        Ok(())
    }
}

/// `host:port/database` of a connection URL, without credentials
fn redact(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => format!(
            "{}:{}{}",
            parsed.host_str().unwrap_or("localhost"),
            parsed.port().unwrap_or(5432),
            parsed.path()
        ),
        Err(_) => "<invalid database url>".to_string(),
    }
}
