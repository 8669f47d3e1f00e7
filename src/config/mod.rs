use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_JWT_SECRET: &str = "change-this-secret-in-production-min-32-chars";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub cookie: CookieConfig,
    pub password: PasswordConfig,
    pub rate_limit: RateLimitConfig,
    pub cors: CorsConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    #[serde(skip_serializing)]
    pub secret: String,
    pub access_expiry_minutes: i64,
    pub refresh_expiry_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    pub refresh_name: String,
    pub domain: String,
    pub secure: bool,
    pub same_site: String,
    pub path: String,
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    pub memory_cost_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_minute: u64,
    pub redis_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("SHUTDOWN_GRACE_SECS") {
            self.server.shutdown_grace_secs = v.parse().unwrap_or(self.server.shutdown_grace_secs);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_MIN_CONNECTIONS") {
            self.database.min_connections = v.parse().unwrap_or(self.database.min_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECT_TIMEOUT_SECS") {
            self.database.connect_timeout_secs = v.parse().unwrap_or(self.database.connect_timeout_secs);
        }

        // JWT overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRY_MINUTES") {
            self.jwt.access_expiry_minutes = v.parse().unwrap_or(self.jwt.access_expiry_minutes);
        }
        if let Ok(v) = env::var("JWT_REFRESH_EXPIRY_HOURS") {
            self.jwt.refresh_expiry_hours = v.parse().unwrap_or(self.jwt.refresh_expiry_hours);
        }

        // Cookie overrides
        if let Ok(v) = env::var("COOKIE_NAME") {
            self.cookie.name = v;
        }
        if let Ok(v) = env::var("COOKIE_REFRESH_NAME") {
            self.cookie.refresh_name = v;
        }
        if let Ok(v) = env::var("COOKIE_DOMAIN") {
            self.cookie.domain = v;
        }
        if let Ok(v) = env::var("COOKIE_SECURE") {
            self.cookie.secure = v.parse().unwrap_or(self.cookie.secure);
        }
        if let Ok(v) = env::var("COOKIE_SAMESITE") {
            self.cookie.same_site = v;
        }
        if let Ok(v) = env::var("COOKIE_PATH") {
            self.cookie.path = v;
        }

        // Password hashing overrides
        if let Ok(v) = env::var("PASSWORD_MEMORY_KIB") {
            self.password.memory_cost_kib = v.parse().unwrap_or(self.password.memory_cost_kib);
        }
        if let Ok(v) = env::var("PASSWORD_TIME_COST") {
            self.password.time_cost = v.parse().unwrap_or(self.password.time_cost);
        }
        if let Ok(v) = env::var("PASSWORD_PARALLELISM") {
            self.password.parallelism = v.parse().unwrap_or(self.password.parallelism);
        }

        // Rate limit overrides
        if let Ok(v) = env::var("RATE_LIMIT_ENABLED") {
            self.rate_limit.enabled = v.parse().unwrap_or(self.rate_limit.enabled);
        }
        if let Ok(v) = env::var("RATE_LIMIT_REQUESTS_PER_MIN") {
            self.rate_limit.requests_per_minute = v.parse().unwrap_or(self.rate_limit.requests_per_minute);
        }
        if let Ok(v) = env::var("REDIS_URL") {
            self.rate_limit.redis_url = v;
        }

        // CORS overrides
        if let Ok(v) = env::var("CORS_ALLOWED_ORIGINS") {
            self.cors.allowed_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Logging overrides
        if let Ok(v) = env::var("LOG_LEVEL") {
            self.log.level = v;
        }
        if let Ok(v) = env::var("LOG_FORMAT") {
            self.log.json = v.eq_ignore_ascii_case("json");
        }

        self
    }

    /// Reject settings that must never reach a running server
    pub fn validate(&self) -> Result<()> {
        if self.environment == Environment::Production {
            if self.jwt.secret == DEFAULT_JWT_SECRET {
                bail!("JWT_SECRET must be set in production");
            }
            if self.jwt.secret.len() < MIN_SECRET_LEN {
                bail!("JWT_SECRET must be at least {} bytes", MIN_SECRET_LEN);
            }
        }
        if self.jwt.access_expiry_minutes <= 0 || self.jwt.refresh_expiry_hours <= 0 {
            bail!("token expiries must be positive");
        }
        if self.database.min_connections > self.database.max_connections {
            bail!(
                "DATABASE_MIN_CONNECTIONS ({}) exceeds DATABASE_MAX_CONNECTIONS ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }
        Ok(())
    }

    pub fn database_url(&self) -> Result<&str> {
        match self.database.url.as_deref() {
            Some(url) => Ok(url),
            None => bail!("DATABASE_URL is not set"),
        }
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                shutdown_grace_secs: 30,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 100,
                min_connections: 10,
                connect_timeout_secs: 30,
            },
            jwt: JwtConfig {
                secret: DEFAULT_JWT_SECRET.to_string(),
                access_expiry_minutes: 15,
                refresh_expiry_hours: 12,
            },
            cookie: CookieConfig {
                name: "app_token".to_string(),
                refresh_name: "app_refresh".to_string(),
                domain: String::new(),
                secure: false,
                same_site: "Lax".to_string(),
                path: "/".to_string(),
            },
            password: PasswordConfig {
                memory_cost_kib: 19 * 1024,
                time_cost: 2,
                parallelism: 1,
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                requests_per_minute: 60,
                redis_url: "redis://localhost:6379".to_string(),
            },
            cors: CorsConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
            },
            log: LogConfig {
                level: "debug".to_string(),
                json: false,
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.database.max_connections = 50;
        config.database.min_connections = 5;
        config.cookie.secure = true;
        config.log.level = "info".to_string();
        config.log.json = true;
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.database.connect_timeout_secs = 10;
        config.cookie.secure = true;
        config.log.level = "info".to_string();
        config.log.json = true;
        config
    }
}
