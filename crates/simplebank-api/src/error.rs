//! API error handling
//!
//! Every failure leaves the API as `{"error": "<message>"}` with a status
//! taken from the business error kind.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use simplebank_core::BankError;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    PaymentRequired(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let Self::Internal(detail) = &self {
            tracing::error!(error = %detail, "Request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<BankError> for ApiError {
    fn from(err: BankError) -> Self {
        match err {
            BankError::Validation(msg) => Self::BadRequest(msg),
            BankError::Unauthorized(msg) => Self::Unauthorized(msg),
            BankError::Forbidden(msg) => Self::Forbidden(msg),
            BankError::NotFound(msg) => Self::NotFound(msg),
            BankError::Conflict(msg) => Self::Conflict(msg),
            BankError::InsufficientFunds(msg) => Self::PaymentRequired(msg),
            BankError::Internal(detail) => Self::Internal(detail),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("Invalid {}", field),
                })
            })
            .collect();
        messages.sort();
        Self::BadRequest(messages.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_error_status() {
        let cases = [
            (BankError::validation("x"), StatusCode::BAD_REQUEST),
            (BankError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (BankError::forbidden("x"), StatusCode::FORBIDDEN),
            (BankError::not_found("x"), StatusCode::NOT_FOUND),
            (BankError::Conflict("x".into()), StatusCode::CONFLICT),
            (BankError::InsufficientFunds("x".into()), StatusCode::PAYMENT_REQUIRED),
            (BankError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_internal_detail_hidden() {
        let err = ApiError::from(BankError::Internal("connection refused".into()));
        assert_eq!(err.to_string(), "Internal server error");
    }
}
