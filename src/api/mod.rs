pub mod dto;
pub mod extract;

pub use dto::{CreateUserRequest, ListResponse, LoginRequest, LoginResponse, UpdateUserRequest, UserResponse};
pub use extract::AppJson;
