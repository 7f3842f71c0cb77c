//! Loans and amortization installments

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One scheduled loan repayment
///
/// `idx` is 1-based and unique within a loan. Once `paid` is set it is
/// never cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub loan_id: Uuid,
    pub idx: u32,
    pub due_date: DateTime<Utc>,
    pub amount: Decimal,
    pub interest_part: Decimal,
    pub principal_part: Decimal,
    pub penalty: Decimal,
    pub paid: bool,
}

impl Installment {
    /// Total to debit when the installment is settled
    pub fn amount_due(&self) -> Decimal {
        self.amount + self.penalty
    }

    pub fn is_due(&self, as_of: DateTime<Utc>) -> bool {
        !self.paid && self.due_date <= as_of
    }
}

/// A loan with its full repayment schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub principal: Decimal,
    /// Annual rate in percent
    pub annual_rate: Decimal,
    pub term_months: u32,
    pub start_date: DateTime<Utc>,
    pub remaining_principal: Decimal,
    pub schedule: Vec<Installment>,
    pub created_at: DateTime<Utc>,
}

impl Loan {
    /// A loan with no principal left to repay
    pub fn is_closed(&self) -> bool {
        self.remaining_principal <= Decimal::ZERO
    }

    pub fn installment(&self, idx: u32) -> Option<&Installment> {
        self.schedule.iter().find(|i| i.idx == idx)
    }
}
