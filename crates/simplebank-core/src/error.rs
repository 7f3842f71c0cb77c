//! Business error kinds
//!
//! Every service returns [`BankError`]; each variant maps to one HTTP status
//! class at the API edge.

use simplebank_auth::AuthError;
use simplebank_crypto::CryptoError;
use simplebank_db::DbError;
use thiserror::Error;

pub type BankResult<T> = Result<T, BankError>;

#[derive(Debug, Error)]
pub enum BankError {
    /// Malformed or out-of-range input
    #[error("{0}")]
    Validation(String),

    /// Bad credentials, CVV mismatch, unknown or tampered card
    #[error("{0}")]
    Unauthorized(String),

    /// The principal does not own the referenced resource
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Duplicate username or email
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InsufficientFunds(String),

    /// Repository or crypto failure; the payload is for logs only
    #[error("Internal error")]
    Internal(String),
}

impl BankError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl From<DbError> for BankError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => Self::NotFound(format!("{} not found", what)),
            DbError::Duplicate(what) => Self::Conflict(format!("Already exists: {}", what)),
            DbError::InsufficientBalance(_) => Self::InsufficientFunds("Insufficient funds".to_string()),
            DbError::InvalidInput(msg) => Self::Validation(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for BankError {
    fn from(err: AuthError) -> Self {
        match err.status_code() {
            400 => Self::Validation(err.to_string()),
            401 => Self::Unauthorized(err.to_string()),
            _ => Self::Internal(format!("{:?}", err)),
        }
    }
}

impl From<CryptoError> for BankError {
    fn from(err: CryptoError) -> Self {
        Self::Internal(err.to_string())
    }
}
