pub mod access;
pub mod auth_api;
pub mod cors;
pub mod hierarchy;

pub use access::{authorize, Allowed, Operation};
pub use cors::create_cors_layer;
pub use auth_api::{auth_middleware, AuthConfig, AuthError, CallerContext};
pub use hierarchy::{resolve_scope, scope_kind, ReportingLink, Scope, ScopeKind, UserDirectory};
