//! Error types for domain value parsing

use thiserror::Error;

/// Result type for domain type conversions
pub type Result<T> = std::result::Result<T, TypesError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("Unknown transaction kind: {0}")]
    UnknownTransactionKind(String),

    #[error("Value out of range for {field}: {value}")]
    OutOfRange { field: &'static str, value: i64 },
}
