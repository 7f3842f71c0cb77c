//! The storage contract shared by the services and the billing worker
//!
//! Every method is one transaction. Compound operations (`apply_movement`,
//! `add_loan`, `mark_installment_paid`) change balances and write the
//! matching journal entries atomically, so a failed call leaves no trace.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use simplebank_types::{Account, Card, Installment, JournalEntry, Loan, User};
use uuid::Uuid;

use crate::DbResult;

/// A signed balance change on one account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub account_id: Uuid,
    pub delta: Decimal,
}

impl Posting {
    pub fn credit(account_id: Uuid, amount: Decimal) -> Self {
        Self {
            account_id,
            delta: amount,
        }
    }

    pub fn debit(account_id: Uuid, amount: Decimal) -> Self {
        Self {
            account_id,
            delta: -amount,
        }
    }
}

/// Transactional store for every persisted entity
///
/// Implementations serialize concurrent writers per account and lock
/// multiple accounts in ascending id order. No balance is ever left negative.
#[async_trait]
pub trait Repository: Send + Sync {
    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Insert a user; `Duplicate` when the username or email is taken
    async fn add_user(&self, user: &User) -> DbResult<()>;

    async fn get_user_by_username(&self, username: &str) -> DbResult<Option<User>>;

    async fn get_user_by_id(&self, id: Uuid) -> DbResult<Option<User>>;

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    async fn add_account(&self, account: &Account) -> DbResult<()>;

    async fn get_account(&self, id: Uuid) -> DbResult<Option<Account>>;

    /// Accounts of one user, oldest first
    async fn get_accounts_by_user(&self, user_id: Uuid) -> DbResult<Vec<Account>>;

    /// Add `delta` to the balance; `InsufficientBalance` if the result would
    /// be negative
    async fn update_account_balance(&self, id: Uuid, delta: Decimal) -> DbResult<Account>;

    /// Apply every posting and append `entry`, all or nothing
    ///
    /// Returns the updated accounts in posting order.
    async fn apply_movement(
        &self,
        postings: &[Posting],
        entry: &JournalEntry,
    ) -> DbResult<Vec<Account>>;

    // ------------------------------------------------------------------
    // Cards
    // ------------------------------------------------------------------

    async fn add_card(&self, card: &Card) -> DbResult<()>;

    async fn get_card_by_id(&self, id: Uuid) -> DbResult<Option<Card>>;

    async fn get_cards_by_account(&self, account_id: Uuid) -> DbResult<Vec<Card>>;

    // ------------------------------------------------------------------
    // Loans
    // ------------------------------------------------------------------

    /// Persist a loan with its schedule and credit the principal to the
    /// loan account, journaling it with `disbursement`
    async fn add_loan(&self, loan: &Loan, disbursement: &JournalEntry) -> DbResult<()>;

    async fn get_loan(&self, id: Uuid) -> DbResult<Option<Loan>>;

    async fn get_loans_by_user(&self, user_id: Uuid) -> DbResult<Vec<Loan>>;

    // ------------------------------------------------------------------
    // Journal
    // ------------------------------------------------------------------

    async fn add_transaction(&self, entry: &JournalEntry) -> DbResult<()>;

    /// Entries touching the account on either side, newest first; equal
    /// timestamps list the later write first
    async fn get_account_transactions(&self, account_id: Uuid) -> DbResult<Vec<JournalEntry>>;

    // ------------------------------------------------------------------
    // Billing
    // ------------------------------------------------------------------

    /// Unpaid installments due at or before `as_of`, ordered by
    /// `(loan_id, due_date)`
    async fn due_installments(&self, as_of: DateTime<Utc>) -> DbResult<Vec<Installment>>;

    /// Record the penalty currently owed on an unpaid installment
    async fn accrue_penalty(&self, loan_id: Uuid, idx: u32, penalty: Decimal) -> DbResult<()>;

    /// Settle an installment
    ///
    /// Debits `amount + penalty` from the loan account, appends `journal`,
    /// marks the installment paid and lowers the remaining principal by its
    /// principal part (never below zero). Fails with `InsufficientBalance`
    /// without side effects, and with `Constraint` if it was already paid.
    async fn mark_installment_paid(
        &self,
        loan_id: Uuid,
        idx: u32,
        penalty: Decimal,
        journal: &[JournalEntry],
    ) -> DbResult<Loan>;

    /// Cheap liveness probe
    async fn health_check(&self) -> DbResult<()>;
}
