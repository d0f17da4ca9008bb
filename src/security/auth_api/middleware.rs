use super::{
    config::AuthConfig,
    error::AuthError,
    types::{CallerContext, Claims},
};
use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use tracing::{debug, info};

pub fn extract_bearer_token<'a>(request: &'a Request<Body>, config: &AuthConfig) -> Option<&'a str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(config.bearer_prefix.as_str()))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub fn decode_caller(token: &str, config: &AuthConfig) -> Result<CallerContext, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = config.leeway_seconds;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
        _ => {
            debug!("Token rejected: {e}");
            AuthError::InvalidToken
        }
    })?;

    Ok(CallerContext::from(data.claims))
}

/// Decodes the bearer token and stores the resulting `CallerContext` in the
/// request extensions. Anonymous paths pass through untouched.
pub async fn auth_middleware(
    State(config): State<Arc<AuthConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let path = request.uri().path().to_string();

    if config.is_anonymous_allowed(&path) {
        return Ok(next.run(request).await);
    }

    let token = extract_bearer_token(&request, &config).ok_or(AuthError::MissingToken)?;
    let caller = decode_caller(token, &config)?;

    info!(
        "{} {} by user={} role={}",
        request.method(),
        path,
        caller.user_id,
        caller.role
    );
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}
