use actix_web::{
    cookie::{Cookie, SameSite},
    http::{header, StatusCode},
    HttpResponse, ResponseError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    // No credential on file for the principal
    #[error("Not connected: {0}")]
    NotConnected(String),

    // Credential exists but has been flagged invalid
    #[error("Access revoked: {0}")]
    AccessRevoked(String),

    // Credential exists but can never be refreshed (no refresh token)
    #[error("Incomplete grant: {0}")]
    IncompleteGrant(String),

    // Upstream confirmed the refresh token itself is dead
    #[error("Reauthorization required: {0}")]
    ReauthRequired(String),

    // Refresh failed for transient reasons; the stored credential is untouched
    #[error("Temporarily unavailable: {0}")]
    TemporarilyUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl AppError {
    /// Stable machine-readable kind for the frontend, where one exists.
    fn code(&self) -> Option<&'static str> {
        match self {
            AppError::Unauthenticated(_) => Some("UNAUTHENTICATED"),
            AppError::NotConnected(_) => Some("NOT_CONNECTED"),
            AppError::AccessRevoked(_) => Some("ACCESS_REVOKED"),
            AppError::IncompleteGrant(_) => Some("INCOMPLETE_GRANT"),
            AppError::ReauthRequired(_) => Some("REAUTH_REQUIRED"),
            AppError::TemporarilyUnavailable(_) => Some("TOKEN_REFRESH_FAILED"),
            _ => None,
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_message) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::Unauthenticated(ref e) => (StatusCode::UNAUTHORIZED, e.clone()),
            AppError::NotConnected(ref e) => (StatusCode::UNAUTHORIZED, e.clone()),
            AppError::AccessRevoked(ref e) => (StatusCode::UNAUTHORIZED, e.clone()),
            AppError::IncompleteGrant(ref e) => (StatusCode::UNAUTHORIZED, e.clone()),
            AppError::ReauthRequired(ref e) => (StatusCode::UNAUTHORIZED, e.clone()),
            AppError::TemporarilyUnavailable(ref e) => (StatusCode::SERVICE_UNAVAILABLE, e.clone()),
            AppError::Validation(ref e) => (StatusCode::BAD_REQUEST, e.clone()),
            AppError::NotFound(ref e) => (StatusCode::NOT_FOUND, e.clone()),
            AppError::Forbidden(ref e) => (StatusCode::FORBIDDEN, e.clone()),
            AppError::BadRequest(ref e) => (StatusCode::BAD_REQUEST, e.clone()),
            AppError::InternalServerError(ref e) => {
                tracing::error!("Internal server error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.clone())
            }
            AppError::Jwt(ref e) => {
                tracing::error!("JWT error: {:?}", e);
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string())
            }
            AppError::Io(ref e) => {
                tracing::error!("IO error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "IO error".to_string())
            }
            AppError::ExternalServiceError(ref e) => {
                tracing::error!("External service error: {:?}", e);
                (StatusCode::BAD_GATEWAY, e.clone())
            }
            AppError::Http(ref e) => {
                tracing::error!("HTTP error: {:?}", e);
                (StatusCode::BAD_GATEWAY, "HTTP request failed".to_string())
            }
        };

        let body = ErrorResponse {
            detail: error_message,
            code: self.code().map(|c| c.to_string()),
        };

        let mut response_builder = HttpResponse::build(status);

        // Clear the session cookie when the principal's own authentication failed,
        // never for calendar-connection states (those keep the app session alive)
        if matches!(self, AppError::Unauthenticated(_) | AppError::Jwt(_)) {
            let mut token_cookie = Cookie::new("token", "");
            token_cookie.set_http_only(true);
            token_cookie.set_same_site(SameSite::None);
            token_cookie.set_secure(true);
            token_cookie.set_path("/");
            token_cookie.set_max_age(time::Duration::seconds(-1));

            response_builder.insert_header((header::SET_COOKIE, token_cookie.to_string()));
        }

        response_builder.json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::NotConnected(_) => StatusCode::UNAUTHORIZED,
            AppError::AccessRevoked(_) => StatusCode::UNAUTHORIZED,
            AppError::IncompleteGrant(_) => StatusCode::UNAUTHORIZED,
            AppError::ReauthRequired(_) => StatusCode::UNAUTHORIZED,
            AppError::TemporarilyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            AppError::Http(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
