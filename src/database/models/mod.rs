pub mod user;

pub use user::{NewUser, User, UserRole, UserStatus};
