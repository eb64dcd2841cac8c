use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::store::StoreError;
use crate::utils::CipherError;

const GENERIC_MESSAGE: &str = "An unexpected error occurred";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Authentication(String),
    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),
    #[error("User is already anonymized")]
    AlreadyAnonymized,
    #[error("You are already following this user")]
    AlreadyFollowing,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("{0}")]
    Validation(String),
    #[error("Refresh token is expired. Please make a new login!")]
    RefreshTokenExpired,
    #[error("Refresh token is not in database")]
    RefreshTokenNotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("password hashing error: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error(transparent)]
    Cipher(#[from] CipherError),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ApiError {
    code: &'static str,
    message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) | AppError::Unauthorized | AppError::RefreshTokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            AppError::UsernameTaken(_) | AppError::AlreadyAnonymized | AppError::AlreadyFollowing => {
                StatusCode::CONFLICT
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RefreshTokenNotFound
            | AppError::Store(_)
            | AppError::Token(_)
            | AppError::Hashing(_)
            | AppError::Cipher(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Authentication(_) => "AUTH_FAILED",
            AppError::UsernameTaken(_) => "USERNAME_TAKEN",
            AppError::AlreadyAnonymized => "ALREADY_ANONYMIZED",
            AppError::AlreadyFollowing => "ALREADY_FOLLOWING",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::RefreshTokenExpired => "TOKEN_EXPIRED",
            _ => "SERVER_ERROR",
        }
    }

    /// Internal failures are reported with a generic message; the detail only goes to the log.
    fn public_message(&self) -> String {
        match self {
            AppError::Store(_)
            | AppError::Token(_)
            | AppError::Hashing(_)
            | AppError::Cipher(_)
            | AppError::Internal(_) => GENERIC_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(ApiError {
            code: self.code(),
            message: self.public_message(),
        });

        (status, body).into_response()
    }
}
