use crate::core::config::AppConfig;

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub bearer_prefix: String,
    pub leeway_seconds: u64,
    pub allow_anonymous_paths: Vec<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("bearer_prefix", &self.bearer_prefix)
            .field("leeway_seconds", &self.leeway_seconds)
            .field("allow_anonymous_paths", &self.allow_anonymous_paths)
            .finish()
    }
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            bearer_prefix: "Bearer ".to_string(),
            leeway_seconds: 30,
            allow_anonymous_paths: vec!["/health".to_string()],
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(config.jwt_secret())
    }

    pub fn is_anonymous_allowed(&self, path: &str) -> bool {
        self.allow_anonymous_paths
            .iter()
            .any(|allowed| path == allowed || path.starts_with(&format!("{}/", allowed)))
    }
}
