pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod services;
pub mod testing;

pub use config::AppConfig;
pub use error::AppError;
pub use router::{app, AppState};
