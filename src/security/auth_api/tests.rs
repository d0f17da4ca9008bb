#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::core::shared::enums::Role;
    use crate::core::shared::test_utils::{issue_test_token, TEST_JWT_SECRET};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    fn config() -> AuthConfig {
        AuthConfig::new(TEST_JWT_SECRET)
    }

    #[test]
    fn test_decode_valid_token() {
        let user_id = Uuid::new_v4();
        let token = issue_test_token(user_id, "MANAGER", 600);
        let caller = decode_caller(&token, &config()).unwrap();
        assert_eq!(caller.user_id, user_id);
        assert_eq!(caller.role, Role::Manager);
        assert_eq!(caller.email.as_deref(), Some("manager@example.com"));
    }

    #[test]
    fn test_unknown_role_decodes_as_unrecognized() {
        let token = issue_test_token(Uuid::new_v4(), "INTERN", 600);
        let caller = decode_caller(&token, &config()).unwrap();
        assert_eq!(caller.role, Role::Unrecognized);
    }

    #[test]
    fn test_expired_token() {
        let token = issue_test_token(Uuid::new_v4(), "AGENT", -3600);
        assert_eq!(
            decode_caller(&token, &config()).unwrap_err(),
            AuthError::ExpiredToken
        );
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = issue_test_token(Uuid::new_v4(), "AGENT", 600);
        let other = AuthConfig::new("a-completely-different-secret");
        assert_eq!(
            decode_caller(&token, &other).unwrap_err(),
            AuthError::InvalidToken
        );
        assert_eq!(
            decode_caller("not-a-jwt", &config()).unwrap_err(),
            AuthError::InvalidToken
        );
    }

    #[test]
    fn test_user_id_alias() {
        let user_id = Uuid::new_v4();
        let claims = serde_json::json!({
            "userId": user_id,
            "role": "DIRECTOR",
            "exp": chrono::Utc::now().timestamp() + 600,
        });
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
        )
        .unwrap();
        let caller = decode_caller(&token, &config()).unwrap();
        assert_eq!(caller.user_id, user_id);
        assert_eq!(caller.role, Role::Director);
    }

    #[test]
    fn test_extract_bearer_token() {
        let request = Request::builder()
            .header("Authorization", "Bearer abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_bearer_token(&request, &config()), Some("abc.def.ghi"));

        let request = Request::builder()
            .header("Authorization", "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_bearer_token(&request, &config()), None);

        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_bearer_token(&request, &config()), None);
    }

    #[test]
    fn test_anonymous_paths() {
        let config = config();
        assert!(config.is_anonymous_allowed("/health"));
        assert!(!config.is_anonymous_allowed("/healthz"));
        assert!(!config.is_anonymous_allowed("/api/leads"));
    }

    #[test]
    fn test_auth_error_status() {
        assert_eq!(AuthError::MissingToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::ExpiredToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::ExpiredToken.error_code(), "expired_token");
    }
}
