use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use crate::core::config::ServerConfig;

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<Method>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::PATCH,
                Method::OPTIONS,
            ],
            allowed_headers: vec![
                "Content-Type".to_string(),
                "Authorization".to_string(),
                "Accept".to_string(),
                "Origin".to_string(),
            ],
            allow_credentials: true,
            max_age_secs: 3600,
        }
    }
}

impl CorsConfig {
    pub fn with_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    pub fn build(self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .allowed_origins
            .iter()
            .filter_map(|o| o.trim().parse().ok())
            .collect();

        let mut cors = if origins.is_empty() {
            CorsLayer::new().allow_origin(AllowOrigin::predicate(validate_origin))
        } else {
            CorsLayer::new().allow_origin(origins)
        };

        let headers: Vec<header::HeaderName> = self
            .allowed_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        cors = cors
            .allow_methods(self.allowed_methods)
            .allow_headers(headers)
            .max_age(std::time::Duration::from_secs(self.max_age_secs));

        if self.allow_credentials {
            cors = cors.allow_credentials(true);
        }
        cors
    }
}

pub fn create_cors_layer(server: &ServerConfig) -> CorsLayer {
    if server.cors_origins.is_empty() {
        info!("Creating CORS layer accepting any http(s) origin (no origins configured)");
    } else {
        info!("Creating CORS layer with {} configured origins", server.cors_origins.len());
    }
    CorsConfig::default()
        .with_origins(server.cors_origins.clone())
        .build()
}

fn validate_origin(origin: &HeaderValue, _request: &axum::http::request::Parts) -> bool {
    origin.to_str().is_ok_and(is_valid_origin_format)
}

fn is_valid_origin_format(origin: &str) -> bool {
    let Some(rest) = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
    else {
        return false;
    };
    if rest.is_empty() || rest.contains("//") || rest.contains("..") {
        return false;
    }

    let lower = origin.to_lowercase();
    !["<script", "javascript:", "data:", "vbscript:", "%3c", "%3e"]
        .iter()
        .any(|pattern| lower.contains(pattern))
}
