//! Bearer-token authentication.
//!
//! Tokens are issued elsewhere; this module only decodes them into a
//! `CallerContext` that handlers receive through an extractor.

pub mod config;
pub mod error;
pub mod middleware;
mod tests;
pub mod types;

pub use config::AuthConfig;
pub use error::AuthError;
pub use middleware::{auth_middleware, decode_caller, extract_bearer_token};
pub use types::{CallerContext, Claims};
