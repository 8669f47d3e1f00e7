pub mod manager;
pub mod models;
pub mod query_builder;
pub mod repository;

pub use manager::{DatabaseManager, StoreError};
pub use repository::{PgUserRepository, UserPage, UserRepository};
