//! HTTP-facing error type.
//!
//! Every handler returns `Result<_, AppError>`. Server-side failures are
//! logged here and answered with an opaque body.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::auth::TokenError;
use crate::credentials::CredentialError;
use crate::db::RepositoryError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Unknown user or wrong password; the two are never distinguished.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Credential(CredentialError::NotFound) => StatusCode::UNAUTHORIZED,
            AppError::Credential(CredentialError::Storage(err)) | AppError::Repository(err) => {
                repository_status(err)
            }
            AppError::Credential(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Token(err) => err.status(),
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        }

        let message = match self {
            AppError::BadRequest(msg) => msg.clone(),
            AppError::InvalidCredentials | AppError::Credential(CredentialError::NotFound) => {
                "Invalid username or password".to_string()
            }
            AppError::Credential(CredentialError::Storage(err)) | AppError::Repository(err) => {
                match err {
                    RepositoryError::NotFound => "Order not found".to_string(),
                    RepositoryError::Timeout(_) => "Request timed out".to_string(),
                    RepositoryError::Conflict(_) | RepositoryError::Database(_) => {
                        "Internal server error".to_string()
                    }
                }
            }
            AppError::Token(TokenError::BadSignature | TokenError::Expired) => {
                "Invalid or expired token".to_string()
            }
            AppError::Token(TokenError::Malformed(_)) => "Malformed token".to_string(),
            AppError::Credential(_) | AppError::Token(TokenError::Signing(_)) => {
                "Internal server error".to_string()
            }
        };

        HttpResponse::build(status)
            .content_type("text/plain; charset=utf-8")
            .body(message)
    }
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        RepositoryError::Conflict(_) | RepositoryError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
