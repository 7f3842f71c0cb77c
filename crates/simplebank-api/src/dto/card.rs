//! Card DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use simplebank_types::IssuedCard;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCardRequest {
    pub account_id: Uuid,
}

/// Returned once at issuance; carries the PAN and CVV in clear
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardIssuedResponse {
    pub card_id: Uuid,
    pub card_number: String,
    pub cvv: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub created_at: DateTime<Utc>,
}

impl From<IssuedCard> for CardIssuedResponse {
    fn from(card: IssuedCard) -> Self {
        Self {
            card_id: card.card_id,
            card_number: card.card_number,
            cvv: card.cvv,
            expiry_month: card.expiry_month,
            expiry_year: card.expiry_year,
            created_at: card.created_at,
        }
    }
}
