//! Current accounts

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A current account owned by exactly one user
///
/// `balance` is never negative once a repository transaction commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub number: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Open an empty account
    pub fn open(user_id: Uuid, number: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            number,
            balance: Decimal::ZERO,
            created_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}
