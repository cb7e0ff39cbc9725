//! Kibo OAuth2 client-credentials authentication
//!
//! - [`TokenManager`]: obtains, caches and refreshes the access token
//! - [`AuthMiddleware`]: header injection and 401 refresh-and-replay

mod manager;
mod middleware;
mod token;

pub use manager::TokenManager;
pub use middleware::AuthMiddleware;
pub use token::{EXPIRY_BUFFER_SECS, TokenInfo, TokenRecord, TokenResponse};
