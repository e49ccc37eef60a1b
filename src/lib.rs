//! School Portal Backend Library
//!
//! Accounts, marks and teacher-initiated student requests behind one
//! axum router. The binary in `main.rs` only wires configuration.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod marks;
pub mod middleware;
pub mod notify;
pub mod requests;
pub mod storage;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::{PortalError, PortalResult};
