use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;
use tracing::error;

pub const QUOTA_MESSAGE: &str =
    "You have exhausted the number of queries allowed per day, try again tomorrow.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Token error: {0}")]
    TokenError(#[from] TokenError),

    #[error("Daily quota exhausted")]
    QuotaExceeded,

    #[error("Proxy error: {0}")]
    ProxyError(#[from] ProxyError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Secret error: {0}")]
    SecretError(#[from] SecretError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl AppError {
    /// Text that is safe to hand back to the client. Backend failures collapse
    /// into one generic message; the full cause only goes to the log.
    pub fn client_message(&self) -> String {
        match self {
            AppError::ValidationError(reason) => reason.clone(),
            AppError::AuthError(AuthError::InvalidCredentials) => "Wrong credentials. Try again".into(),
            AppError::AuthError(AuthError::Conflict) => "Account already exists".into(),
            AppError::TokenError(_) => "Invalid or expired token".into(),
            AppError::QuotaExceeded => QUOTA_MESSAGE.into(),
            _ => "Internal Server Error".into(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.into())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::InternalError(format!("token encoding failed: {}", err))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::InternalError(format!("background task failed: {}", err))
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        HttpResponse::build(status).json(json!({
            "message": self.client_message()
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::InvalidCredentials => StatusCode::FORBIDDEN,
                AuthError::Conflict => StatusCode::CONFLICT,
            },
            AppError::TokenError(_) => StatusCode::UNAUTHORIZED,
            AppError::QuotaExceeded => StatusCode::UNAUTHORIZED,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account already exists")]
    Conflict,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed token")]
    Malformed,

    #[error("Bad signature")]
    BadSignature,

    #[error("Token expired")]
    Expired,
}

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("API rate limited")]
    RateLimited,

    #[error("API response error: {0}")]
    ResponseError(String),

    #[error("Completion timed out")]
    Timeout,
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProxyError::Timeout
        } else if err.is_decode() {
            ProxyError::ResponseError(err.to_string())
        } else {
            ProxyError::RequestFailed(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store call timed out")]
    Timeout,

    #[error("Duplicate record")]
    Duplicate,
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => DatabaseError::Duplicate,
            sqlx::Error::PoolTimedOut => DatabaseError::Timeout,
            _ => DatabaseError::Unavailable(err.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("Secret unavailable: {0}")]
    Unavailable(String),

    #[error("Secret document invalid: {0}")]
    Invalid(String),

    #[error("Secret fetch timed out")]
    Timeout,
}
