use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::{net::TcpListener, signal, sync::Notify};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use account_api::{
    auth::PasswordHasher,
    config::{AppConfig, LogConfig},
    database::{DatabaseManager, PgUserRepository, UserRepository},
    middleware::{rate_limit::RedisCounterStore, RateLimiter},
    testing::{seed_admin, MemoryUserRepository},
    AppState,
};

#[derive(Parser)]
#[command(name = "account-api", version, about = "User account management and JWT authentication API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run migrations, then serve HTTP (default)
    Serve {
        /// Keep users in memory instead of Postgres; nothing survives a restart
        #[arg(long)]
        memory: bool,

        /// Password for the `admin` account seeded into the in-memory store;
        /// a random one is generated and logged when omitted
        #[arg(long, requires = "memory")]
        admin_password: Option<String>,
    },

    /// Apply pending database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = AppConfig::from_env();
    init_tracing(&config.log);
    config.validate().context("invalid configuration")?;

    info!(environment = ?config.environment, "starting account-api");

    match cli.command.unwrap_or(Command::Serve {
        memory: false,
        admin_password: None,
    }) {
        Command::Migrate => {
            let pool = DatabaseManager::connect(config.database_url()?, &config.database).await?;
            DatabaseManager::migrate(&pool).await
        }
        Command::Serve { memory, admin_password } => serve(config, memory, admin_password).await,
    }
}

fn init_tracing(log: &LogConfig) {
    // RUST_LOG wins over LOG_LEVEL
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn serve(config: AppConfig, memory: bool, admin_password: Option<String>) -> anyhow::Result<()> {
    let hasher =
        PasswordHasher::from_config(&config.password).context("invalid password hashing parameters")?;

    let users: Arc<dyn UserRepository> = if memory {
        warn!("using the in-memory user store; data is lost on exit");
        let store = Arc::new(MemoryUserRepository::new());
        let generated = admin_password.is_none();
        let (admin, password) = seed_admin(store.as_ref(), &hasher, admin_password).await?;
        if generated {
            warn!(username = %admin.username, %password, "seeded in-memory admin with a generated password");
        } else {
            info!(username = %admin.username, "seeded in-memory admin account");
        }
        store
    } else {
        let pool = DatabaseManager::connect(config.database_url()?, &config.database).await?;
        DatabaseManager::migrate(&pool).await?;
        Arc::new(PgUserRepository::new(pool))
    };

    let rate_limiter = if config.rate_limit.enabled {
        let store = RedisCounterStore::from_url(&config.rate_limit.redis_url)
            .context("failed to configure the rate limit store")?;
        info!(
            requests_per_minute = config.rate_limit.requests_per_minute,
            "rate limiting enabled"
        );
        Some(RateLimiter::new(Arc::new(store), config.rate_limit.requests_per_minute))
    } else {
        None
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let grace = Duration::from_secs(config.server.shutdown_grace_secs);
    let app = account_api::app(AppState::new(config, users, hasher, rate_limiter));

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "listening");

    let stop = Arc::new(Notify::new());
    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown({
            let stop = stop.clone();
            async move { stop.notified().await }
        });
    let mut handle = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut handle => {
            return result.context("server task failed")?.context("server error");
        }
        _ = shutdown_signal() => {}
    }

    info!(grace_secs = grace.as_secs(), "draining in-flight requests");
    stop.notify_one();

    match tokio::time::timeout(grace, handle).await {
        Ok(result) => {
            result.context("server task failed")?.context("server error")?;
            info!("server stopped");
        }
        Err(_) => warn!("grace period elapsed, closing remaining connections"),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, starting graceful shutdown"),
        _ = terminate => info!("received SIGTERM, starting graceful shutdown"),
    }
}
