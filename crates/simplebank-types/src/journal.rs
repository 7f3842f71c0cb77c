//! Journal entries
//!
//! Every money movement writes exactly one immutable entry in the same
//! repository transaction as the balance change it describes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::TypesError;

/// What caused a money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Transfer,
    Payment,
    LoanDisbursement,
    LoanInstallment,
    Penalty,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Transfer => "transfer",
            Self::Payment => "payment",
            Self::LoanDisbursement => "loan_disbursement",
            Self::LoanInstallment => "loan_installment",
            Self::Penalty => "penalty",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(Self::Deposit),
            "transfer" => Ok(Self::Transfer),
            "payment" => Ok(Self::Payment),
            "loan_disbursement" => Ok(Self::LoanDisbursement),
            "loan_installment" => Ok(Self::LoanInstallment),
            "penalty" => Ok(Self::Penalty),
            other => Err(TypesError::UnknownTransactionKind(other.to_string())),
        }
    }
}

/// One recorded money movement
///
/// At least one of `from_account_id` / `to_account_id` is set and `amount`
/// is strictly positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub from_account_id: Option<Uuid>,
    pub to_account_id: Option<Uuid>,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub kind: TransactionKind,
    pub description: String,
}

impl JournalEntry {
    pub fn new(
        kind: TransactionKind,
        from_account_id: Option<Uuid>,
        to_account_id: Option<Uuid>,
        amount: Decimal,
        description: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_account_id,
            to_account_id,
            amount,
            timestamp,
            kind,
            description: description.into(),
        }
    }

    /// Entry crediting a single account
    pub fn credit(
        kind: TransactionKind,
        to: Uuid,
        amount: Decimal,
        description: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(kind, None, Some(to), amount, description, timestamp)
    }

    /// Entry debiting a single account
    pub fn debit(
        kind: TransactionKind,
        from: Uuid,
        amount: Decimal,
        description: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(kind, Some(from), None, amount, description, timestamp)
    }

    /// Whether the entry touches the given account on either side
    pub fn involves(&self, account_id: Uuid) -> bool {
        self.from_account_id == Some(account_id) || self.to_account_id == Some(account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kind_string_forms_agree() {
        for kind in [
            TransactionKind::Deposit,
            TransactionKind::Transfer,
            TransactionKind::Payment,
            TransactionKind::LoanDisbursement,
            TransactionKind::LoanInstallment,
            TransactionKind::Penalty,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(kind.as_str().parse::<TransactionKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = "refund".parse::<TransactionKind>().unwrap_err();
        assert_eq!(err, TypesError::UnknownTransactionKind("refund".to_string()));
    }

    #[test]
    fn test_involves() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let entry = JournalEntry::new(
            TransactionKind::Transfer,
            Some(a),
            Some(b),
            dec!(10),
            "Transfer",
            Utc::now(),
        );
        assert!(entry.involves(a));
        assert!(entry.involves(b));
        assert!(!entry.involves(Uuid::new_v4()));
    }
}
