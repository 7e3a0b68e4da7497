use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::models::ApiError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("An account with this email already exists")]
    DuplicateAccount,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("No account found with this email address")]
    AccountNotFound,

    #[error("No password reset was requested for this email")]
    NoResetRequest,

    #[error("Invalid reset token")]
    InvalidToken,

    #[error("Reset link has expired")]
    ExpiredToken,

    #[error("Invalid or expired OTP")]
    InvalidOtp,

    #[error("Lottery not found: {0}")]
    LotteryNotFound(String),

    #[error("Lottery {0} is not open for ticket sales")]
    LotteryClosed(String),

    #[error("Lottery {0} has already been drawn")]
    AlreadyDrawn(String),

    #[error("Ticket number {0} is already taken for this lottery")]
    DuplicateTicketNumber(String),

    #[error("Invalid status transition: {0}")]
    InvalidStatusTransition(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AppError {
    /// Stable machine-readable code returned in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::PermissionDenied => "FORBIDDEN",
            AppError::DuplicateAccount => "DUPLICATE_ACCOUNT",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            AppError::NoResetRequest => "NO_RESET_REQUEST",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::ExpiredToken => "EXPIRED_TOKEN",
            AppError::InvalidOtp => "INVALID_OTP",
            AppError::LotteryNotFound(_) => "LOTTERY_NOT_FOUND",
            AppError::LotteryClosed(_) => "LOTTERY_CLOSED",
            AppError::AlreadyDrawn(_) => "ALREADY_DRAWN",
            AppError::DuplicateTicketNumber(_) => "DUPLICATE_TICKET_NUMBER",
            AppError::InvalidStatusTransition(_) => "INVALID_STATUS_TRANSITION",
            AppError::ExternalApiError(_) | AppError::ReqwestError(_) => "EXTERNAL_API_ERROR",
            AppError::StorageError(_) | AppError::IoError(_) => "STORAGE_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::NoResetRequest
            | AppError::InvalidToken
            | AppError::ExpiredToken
            | AppError::InvalidOtp => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied => StatusCode::FORBIDDEN,
            AppError::NotFound(_) | AppError::AccountNotFound | AppError::LotteryNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::DuplicateAccount
            | AppError::LotteryClosed(_)
            | AppError::AlreadyDrawn(_)
            | AppError::DuplicateTicketNumber(_)
            | AppError::InvalidStatusTransition(_) => StatusCode::CONFLICT,
            AppError::ExternalApiError(_) | AppError::ReqwestError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let message = if status_code.is_server_error() {
            log::error!("{}: {self}", self.code());
            match self {
                AppError::ExternalApiError(_) | AppError::ReqwestError(_) => {
                    "External service unavailable".to_string()
                }
                AppError::StorageError(_) | AppError::IoError(_) => "Storage error".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            log::warn!("{}: {self}", self.code());
            self.to_string()
        };

        HttpResponse::build(status_code).json(json!({
            "success": false,
            "error": ApiError {
                code: self.code().to_string(),
                message,
            }
        }))
    }
}
