//! Money movement DTOs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use simplebank_types::JournalEntry;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DepositRequest {
    #[serde(alias = "to")]
    pub account_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TransferRequest {
    #[serde(alias = "from")]
    pub from_account_id: Uuid,
    #[serde(alias = "to")]
    pub to_account_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CardPaymentRequest {
    pub card_id: Uuid,
    pub cvv: String,
    pub amount: Decimal,
    #[validate(length(min = 1, max = 255, message = "Merchant must be 1 to 255 characters"))]
    pub merchant: String,
}

/// Outcome of a deposit, transfer or payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementResponse {
    pub status: String,
    pub transaction: JournalEntry,
}

impl MovementResponse {
    pub fn success(transaction: JournalEntry) -> Self {
        Self {
            status: "success".to_string(),
            transaction,
        }
    }
}
