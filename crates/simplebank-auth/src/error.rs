//! Authentication error types
//!
//! Messages are safe to show to clients; internal details stay in the
//! `Internal` payload, which is never displayed.

use thiserror::Error;

/// Result type alias for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    // =========================================================================
    // Token Errors
    // =========================================================================
    /// No credentials were presented
    #[error("Missing authorization token")]
    MissingToken,

    /// Token has expired
    #[error("Token has expired")]
    TokenExpired,

    /// Token is invalid (malformed, wrong signature, etc.)
    #[error("Invalid token")]
    InvalidToken,

    // =========================================================================
    // Credential Errors
    // =========================================================================
    /// Unknown user or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Password rejected before hashing
    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    /// Stored hash could not be parsed
    #[error("Password verification failed")]
    PasswordVerificationFailed,

    /// Hashing itself failed
    #[error("Password hashing failed")]
    PasswordHashingFailed,

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (should not be exposed to clients)
    #[error("Internal error")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidPassword(_) => 400,

            Self::MissingToken
            | Self::TokenExpired
            | Self::InvalidToken
            | Self::InvalidCredentials
            | Self::PasswordVerificationFailed => 401,

            Self::PasswordHashingFailed | Self::Internal(_) => 500,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            _ => Self::InvalidToken,
        }
    }
}
