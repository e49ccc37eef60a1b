//! Authentication Module
//! Mission: Own user accounts, credentials and session tokens

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;
pub mod user_store;

pub use jwt::JwtHandler;
pub use middleware::{auth_middleware, authorize};
pub use password::PasswordService;
pub use service::AuthService;
pub use user_store::UserStore;
