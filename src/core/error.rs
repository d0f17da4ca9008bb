use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// A single rejected input field, or a rejected import row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn required(field: impl Into<String>) -> Self {
        Self::new(field, "is required")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("validation failed: {0:?}")]
    Validation(Vec<FieldError>),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} not found or unauthorized")]
    NotFoundOrUnauthorized(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("connection pool error: {0}")]
    Pool(String),
}

pub type CrmResult<T> = Result<T, CrmError>;

impl CrmError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) | Self::NotFoundOrUnauthorized(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Pool(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::NotFound(_) | Self::NotFoundOrUnauthorized(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::Database(_) | Self::Pool(_) => "internal_error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Validation(_) => "Validation failed".to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::NotFoundOrUnauthorized(what) => format!("{what} not found or unauthorized"),
            Self::Forbidden(_) => "You don't have permission to perform this action".to_string(),
            Self::Conflict(message) => message.clone(),
            Self::Database(_) | Self::Pool(_) => "An internal error occurred".to_string(),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Pool(_))
    }
}

impl From<diesel::result::Error> for CrmError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => Self::NotFound("Record"),
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for CrmError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

impl From<QueryRejection> for CrmError {
    fn from(rejection: QueryRejection) -> Self {
        Self::invalid("query", rejection.body_text())
    }
}

impl From<PathRejection> for CrmError {
    fn from(rejection: PathRejection) -> Self {
        Self::invalid("path", rejection.body_text())
    }
}

impl From<JsonRejection> for CrmError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid("body", rejection.body_text())
    }
}

impl IntoResponse for CrmError {
    fn into_response(self) -> Response {
        if self.is_internal() {
            log::error!("Request failed: {self}");
        }

        let status = self.status_code();
        let mut body = json!({
            "error": self.error_code(),
            "message": self.message(),
        });
        if let Self::Validation(details) = &self {
            body["details"] = json!(details);
        }
        (status, Json(body)).into_response()
    }
}
