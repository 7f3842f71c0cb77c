//! Payment cards and their client-facing views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored card record
///
/// Only the encrypted PAN and the CVV hash are kept. `hmac` authenticates
/// `id`, `account_id`, `pan_encrypted`, `expiry_month` and `expiry_year`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub account_id: Uuid,
    pub pan_encrypted: String,
    pub cvv_hash: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub hmac: String,
    pub created_at: DateTime<Utc>,
}

/// Issuance result: the only place the plaintext PAN and CVV ever appear
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedCard {
    pub card_id: Uuid,
    pub account_id: Uuid,
    pub card_number: String,
    pub cvv: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub created_at: DateTime<Utc>,
}

/// Card listing entry with the PAN reduced to its last four digits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedCard {
    pub id: Uuid,
    pub account_id: Uuid,
    pub number_masked: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub created_at: DateTime<Utc>,
}
