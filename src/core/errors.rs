use spin_sdk::http::Response;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Forbidden,
    NotFound(String),
    Conflict(String),
    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::Unauthorized => write!(f, "Unauthorized"),
            ApiError::Forbidden => write!(f, "Forbidden"),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal Error: {}", msg),
        }
    }
}

impl From<ApiError> for Response {
    fn from(err: ApiError) -> Self {
        let (status, msg) = match err {
            ApiError::BadRequest(msg) => (400, msg),
            ApiError::Unauthorized => (401, "Unauthorized".to_string()),
            ApiError::Forbidden => (403, "Forbidden".to_string()),
            ApiError::NotFound(msg) => (404, msg),
            ApiError::Conflict(msg) => (409, msg),
            ApiError::InternalError(msg) => (500, msg),
        };

        Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&serde_json::json!({ "error": msg })).unwrap_or_default())
            .build()
    }
}

impl std::error::Error for ApiError {}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}
