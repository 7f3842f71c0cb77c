//! Loan DTOs

use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoanRequest {
    pub account_id: Uuid,
    #[serde(alias = "principal")]
    pub amount: Decimal,
    #[validate(range(min = 1, message = "Term must be at least one month"))]
    pub term_months: u32,
}
