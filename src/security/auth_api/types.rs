use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::AuthError;
use crate::core::shared::enums::Role;

/// Claims carried by a bearer token. `sub` is also accepted as `userId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(alias = "userId")]
    pub sub: Uuid,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: usize,
}

/// Identity of the caller, passed explicitly into every service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub user_id: Uuid,
    pub role: Role,
    pub email: Option<String>,
}

impl CallerContext {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            role,
            email: None,
        }
    }
}

impl From<Claims> for CallerContext {
    fn from(claims: Claims) -> Self {
        // Unknown role strings decode to `Role::Unrecognized`.
        let role = claims.role.parse().unwrap_or_default();
        Self {
            user_id: claims.sub,
            role,
            email: claims.email,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerContext>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}
