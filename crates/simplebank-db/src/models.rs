//! Database models - mapped from PostgreSQL tables

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use simplebank_types::{Account, Card, Installment, JournalEntry, Loan, TypesError, User};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{DbError, DbResult};

fn to_u32(field: &'static str, value: i32) -> DbResult<u32> {
    u32::try_from(value).map_err(|_| {
        DbError::from(TypesError::OutOfRange {
            field,
            value: i64::from(value),
        })
    })
}

pub(crate) fn to_i32(field: &'static str, value: u32) -> DbResult<i32> {
    i32::try_from(value).map_err(|_| {
        DbError::InvalidInput(format!("{} out of range: {}", field, value))
    })
}

// ============================================================================
// Users & Accounts
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(row: DbUser) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub number: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<DbAccount> for Account {
    fn from(row: DbAccount) -> Self {
        Account {
            id: row.id,
            user_id: row.user_id,
            number: row.number,
            balance: row.balance,
            created_at: row.created_at,
        }
    }
}

// ============================================================================
// Cards
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct DbCard {
    pub id: Uuid,
    pub account_id: Uuid,
    pub pan_encrypted: String,
    pub cvv_hash: String,
    pub expiry_month: i32,
    pub expiry_year: i32,
    pub hmac: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbCard> for Card {
    type Error = DbError;

    fn try_from(row: DbCard) -> DbResult<Self> {
        Ok(Card {
            id: row.id,
            account_id: row.account_id,
            pan_encrypted: row.pan_encrypted,
            cvv_hash: row.cvv_hash,
            expiry_month: to_u32("expiry_month", row.expiry_month)?,
            expiry_year: row.expiry_year,
            hmac: row.hmac,
            created_at: row.created_at,
        })
    }
}

// ============================================================================
// Loans
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct DbLoan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub principal: Decimal,
    pub annual_rate: Decimal,
    pub term_months: i32,
    pub start_date: DateTime<Utc>,
    pub remaining_principal: Decimal,
    pub created_at: DateTime<Utc>,
}

impl DbLoan {
    /// Attach an already-ordered schedule
    pub fn into_loan(self, schedule: Vec<Installment>) -> DbResult<Loan> {
        Ok(Loan {
            id: self.id,
            user_id: self.user_id,
            account_id: self.account_id,
            principal: self.principal,
            annual_rate: self.annual_rate,
            term_months: to_u32("term_months", self.term_months)?,
            start_date: self.start_date,
            remaining_principal: self.remaining_principal,
            schedule,
            created_at: self.created_at,
        })
    }
}

/// A row of `loan_payments`
#[derive(Debug, Clone, FromRow)]
pub struct DbLoanPayment {
    pub loan_id: Uuid,
    pub idx: i32,
    pub due_date: DateTime<Utc>,
    pub amount: Decimal,
    pub interest_part: Decimal,
    pub principal_part: Decimal,
    pub penalty: Decimal,
    pub paid: bool,
}

impl TryFrom<DbLoanPayment> for Installment {
    type Error = DbError;

    fn try_from(row: DbLoanPayment) -> DbResult<Self> {
        Ok(Installment {
            loan_id: row.loan_id,
            idx: to_u32("idx", row.idx)?,
            due_date: row.due_date,
            amount: row.amount,
            interest_part: row.interest_part,
            principal_part: row.principal_part,
            penalty: row.penalty,
            paid: row.paid,
        })
    }
}

// ============================================================================
// Journal
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct DbTransaction {
    pub id: Uuid,
    pub from_account_id: Option<Uuid>,
    pub to_account_id: Option<Uuid>,
    pub amount: Decimal,
    pub occurred_at: DateTime<Utc>,
    pub kind: String,
    pub description: String,
}

impl TryFrom<DbTransaction> for JournalEntry {
    type Error = DbError;

    fn try_from(row: DbTransaction) -> DbResult<Self> {
        Ok(JournalEntry {
            id: row.id,
            from_account_id: row.from_account_id,
            to_account_id: row.to_account_id,
            amount: row.amount,
            timestamp: row.occurred_at,
            kind: row.kind.parse()?,
            description: row.description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_unknown_kind_is_decode_error() {
        let row = DbTransaction {
            id: Uuid::new_v4(),
            from_account_id: None,
            to_account_id: Some(Uuid::new_v4()),
            amount: dec!(5),
            occurred_at: Utc::now(),
            kind: "chargeback".to_string(),
            description: String::new(),
        };
        assert!(matches!(JournalEntry::try_from(row), Err(DbError::Decode(_))));
    }

    #[test]
    fn test_negative_idx_rejected() {
        let row = DbLoanPayment {
            loan_id: Uuid::new_v4(),
            idx: -1,
            due_date: Utc::now(),
            amount: dec!(1),
            interest_part: dec!(0),
            principal_part: dec!(1),
            penalty: dec!(0),
            paid: false,
        };
        assert!(Installment::try_from(row).is_err());
    }
}
