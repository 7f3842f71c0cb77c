//! In-memory repository
//!
//! Every operation holds one async mutex for its whole duration, validates
//! before it mutates, and therefore commits all or nothing. Suitable for
//! tests and single-process demos.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use simplebank_types::{Account, Card, Installment, JournalEntry, Loan, User};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{DbError, DbResult, Posting, Repository};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    accounts: HashMap<Uuid, Account>,
    cards: HashMap<Uuid, Card>,
    loans: HashMap<Uuid, Loan>,
    /// Append-only, in commit order
    journal: Vec<JournalEntry>,
}

impl MemoryState {
    fn account_mut(&mut self, id: Uuid) -> DbResult<&mut Account> {
        self.accounts
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("Account {}", id)))
    }

    fn check_entry(&self, entry: &JournalEntry) -> DbResult<()> {
        if entry.amount <= Decimal::ZERO {
            return Err(DbError::Constraint("journal amount must be positive".to_string()));
        }
        if entry.from_account_id.is_none() && entry.to_account_id.is_none() {
            return Err(DbError::Constraint("journal entry needs an account".to_string()));
        }
        for id in entry.from_account_id.iter().chain(entry.to_account_id.iter()) {
            if !self.accounts.contains_key(id) {
                return Err(DbError::NotFound(format!("Account {}", id)));
            }
        }
        Ok(())
    }
}

/// Repository kept entirely in process memory
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn add_user(&self, user: &User) -> DbResult<()> {
        let mut state = self.state.lock().await;

        if state.users.values().any(|u| u.username == user.username) {
            return Err(DbError::Duplicate(format!("Username {} already exists", user.username)));
        }
        if state.users.values().any(|u| u.email == user.email) {
            return Err(DbError::Duplicate(format!("Email {} already exists", user.email)));
        }

        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn get_user_by_id(&self, id: Uuid) -> DbResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn add_account(&self, account: &Account) -> DbResult<()> {
        let mut state = self.state.lock().await;

        if !state.users.contains_key(&account.user_id) {
            return Err(DbError::NotFound(format!("User {}", account.user_id)));
        }
        if account.balance < Decimal::ZERO {
            return Err(DbError::Constraint("balance must not be negative".to_string()));
        }
        if state.accounts.values().any(|a| a.number == account.number) {
            return Err(DbError::Duplicate(format!("Account number {}", account.number)));
        }

        state.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn get_account(&self, id: Uuid) -> DbResult<Option<Account>> {
        let state = self.state.lock().await;
        Ok(state.accounts.get(&id).cloned())
    }

    async fn get_accounts_by_user(&self, user_id: Uuid) -> DbResult<Vec<Account>> {
        let state = self.state.lock().await;
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(accounts)
    }

    async fn update_account_balance(&self, id: Uuid, delta: Decimal) -> DbResult<Account> {
        let mut state = self.state.lock().await;
        let account = state.account_mut(id)?;

        let next = account.balance + delta;
        if next < Decimal::ZERO {
            return Err(DbError::InsufficientBalance(format!(
                "Account {}: have {}, need {}",
                id, account.balance, -delta
            )));
        }

        account.balance = next;
        Ok(account.clone())
    }

    async fn apply_movement(
        &self,
        postings: &[Posting],
        entry: &JournalEntry,
    ) -> DbResult<Vec<Account>> {
        let mut state = self.state.lock().await;
        state.check_entry(entry)?;

        let mut projected: HashMap<Uuid, Decimal> = HashMap::new();
        for posting in postings {
            let current = match projected.get(&posting.account_id) {
                Some(balance) => *balance,
                None => state
                    .accounts
                    .get(&posting.account_id)
                    .map(|a| a.balance)
                    .ok_or_else(|| DbError::NotFound(format!("Account {}", posting.account_id)))?,
            };
            let next = current + posting.delta;
            if next < Decimal::ZERO {
                return Err(DbError::InsufficientBalance(format!(
                    "Account {}: balance {} cannot cover {}",
                    posting.account_id, current, -posting.delta
                )));
            }
            projected.insert(posting.account_id, next);
        }

        let mut updated = Vec::with_capacity(postings.len());
        for posting in postings {
            let account = state.account_mut(posting.account_id)?;
            account.balance += posting.delta;
            updated.push(account.clone());
        }
        state.journal.push(entry.clone());

        Ok(updated)
    }

    async fn add_card(&self, card: &Card) -> DbResult<()> {
        let mut state = self.state.lock().await;

        if !state.accounts.contains_key(&card.account_id) {
            return Err(DbError::NotFound(format!("Account {}", card.account_id)));
        }
        if !(1..=12).contains(&card.expiry_month) {
            return Err(DbError::Constraint(format!("expiry month {}", card.expiry_month)));
        }

        state.cards.insert(card.id, card.clone());
        Ok(())
    }

    async fn get_card_by_id(&self, id: Uuid) -> DbResult<Option<Card>> {
        let state = self.state.lock().await;
        Ok(state.cards.get(&id).cloned())
    }

    async fn get_cards_by_account(&self, account_id: Uuid) -> DbResult<Vec<Card>> {
        let state = self.state.lock().await;
        let mut cards: Vec<Card> = state
            .cards
            .values()
            .filter(|c| c.account_id == account_id)
            .cloned()
            .collect();
        cards.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(cards)
    }

    async fn add_loan(&self, loan: &Loan, disbursement: &JournalEntry) -> DbResult<()> {
        let mut state = self.state.lock().await;

        if state.loans.contains_key(&loan.id) {
            return Err(DbError::Duplicate(format!("Loan {}", loan.id)));
        }
        state.check_entry(disbursement)?;
        state.account_mut(loan.account_id)?.balance += loan.principal;
        state.loans.insert(loan.id, loan.clone());
        state.journal.push(disbursement.clone());

        Ok(())
    }

    async fn get_loan(&self, id: Uuid) -> DbResult<Option<Loan>> {
        let state = self.state.lock().await;
        Ok(state.loans.get(&id).cloned())
    }

    async fn get_loans_by_user(&self, user_id: Uuid) -> DbResult<Vec<Loan>> {
        let state = self.state.lock().await;
        let mut loans: Vec<Loan> = state
            .loans
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        loans.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(loans)
    }

    async fn add_transaction(&self, entry: &JournalEntry) -> DbResult<()> {
        let mut state = self.state.lock().await;
        state.check_entry(entry)?;
        state.journal.push(entry.clone());
        Ok(())
    }

    async fn get_account_transactions(&self, account_id: Uuid) -> DbResult<Vec<JournalEntry>> {
        let state = self.state.lock().await;
        // Reverse commit order first so the stable sort keeps later writes ahead on ties
        let mut entries: Vec<JournalEntry> = state
            .journal
            .iter()
            .rev()
            .filter(|e| e.involves(account_id))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    async fn due_installments(&self, as_of: DateTime<Utc>) -> DbResult<Vec<Installment>> {
        let state = self.state.lock().await;
        let mut due: Vec<Installment> = state
            .loans
            .values()
            .flat_map(|loan| loan.schedule.iter())
            .filter(|i| i.is_due(as_of))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.loan_id.cmp(&b.loan_id).then(a.due_date.cmp(&b.due_date)));
        Ok(due)
    }

    async fn accrue_penalty(&self, loan_id: Uuid, idx: u32, penalty: Decimal) -> DbResult<()> {
        let mut state = self.state.lock().await;
        let installment = state
            .loans
            .get_mut(&loan_id)
            .and_then(|loan| loan.schedule.iter_mut().find(|i| i.idx == idx && !i.paid))
            .ok_or_else(|| {
                DbError::NotFound(format!("Unpaid installment {} of loan {}", idx, loan_id))
            })?;

        installment.penalty = penalty;
        Ok(())
    }

    async fn mark_installment_paid(
        &self,
        loan_id: Uuid,
        idx: u32,
        penalty: Decimal,
        journal: &[JournalEntry],
    ) -> DbResult<Loan> {
        let mut state = self.state.lock().await;

        let loan = state
            .loans
            .get(&loan_id)
            .ok_or_else(|| DbError::NotFound(format!("Loan {}", loan_id)))?;
        let installment = loan
            .installment(idx)
            .ok_or_else(|| DbError::NotFound(format!("Installment {} of loan {}", idx, loan_id)))?;
        if installment.paid {
            return Err(DbError::Constraint(format!(
                "Installment {} of loan {} is already paid",
                idx, loan_id
            )));
        }

        let account_id = loan.account_id;
        let mut assessed = installment.clone();
        assessed.penalty = penalty;
        let total = assessed.amount_due();
        let principal_part = assessed.principal_part;

        for entry in journal {
            state.check_entry(entry)?;
        }

        let account = state.account_mut(account_id)?;
        if account.balance < total {
            return Err(DbError::InsufficientBalance(format!(
                "Account {}: have {}, need {}",
                account_id, account.balance, total
            )));
        }
        account.balance -= total;

        state.journal.extend(journal.iter().cloned());

        let loan = state
            .loans
            .get_mut(&loan_id)
            .ok_or_else(|| DbError::NotFound(format!("Loan {}", loan_id)))?;
        if let Some(installment) = loan.schedule.iter_mut().find(|i| i.idx == idx) {
            installment.paid = true;
            installment.penalty = penalty;
        }
        loan.remaining_principal = (loan.remaining_principal - principal_part).max(Decimal::ZERO);

        Ok(loan.clone())
    }

    async fn health_check(&self) -> DbResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use simplebank_types::TransactionKind;

    async fn seeded() -> (MemoryRepository, User, Account, Account) {
        let repo = MemoryRepository::new();
        let now = Utc::now();
        let user = User::new("alice".into(), "a@x".into(), "hash".into(), now);
        repo.add_user(&user).await.unwrap();

        let a = Account::open(user.id, "4081781010000000001".into(), now);
        let b = Account::open(user.id, "4081781010000000002".into(), now);
        repo.add_account(&a).await.unwrap();
        repo.add_account(&b).await.unwrap();
        (repo, user, a, b)
    }

    #[tokio::test]
    async fn test_duplicate_username_and_email() {
        let (repo, user, _, _) = seeded().await;
        let now = Utc::now();

        let same_name = User::new(user.username.clone(), "b@x".into(), "h".into(), now);
        assert!(matches!(repo.add_user(&same_name).await, Err(DbError::Duplicate(_))));

        let same_email = User::new("bob".into(), user.email.clone(), "h".into(), now);
        assert!(matches!(repo.add_user(&same_email).await, Err(DbError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_update_balance_never_negative() {
        let (repo, _, a, _) = seeded().await;

        let account = repo.update_account_balance(a.id, dec!(50)).await.unwrap();
        assert_eq!(account.balance, dec!(50));

        let err = repo.update_account_balance(a.id, dec!(-50.01)).await.unwrap_err();
        assert!(matches!(err, DbError::InsufficientBalance(_)));
        assert_eq!(repo.get_account(a.id).await.unwrap().unwrap().balance, dec!(50));

        let missing = repo.update_account_balance(Uuid::new_v4(), dec!(1)).await;
        assert!(matches!(missing, Err(DbError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_movement_leaves_no_trace() {
        let (repo, _, a, b) = seeded().await;
        repo.update_account_balance(a.id, dec!(10)).await.unwrap();

        let entry = JournalEntry::new(
            TransactionKind::Transfer,
            Some(a.id),
            Some(b.id),
            dec!(11),
            "Transfer",
            Utc::now(),
        );
        let result = repo
            .apply_movement(&[Posting::debit(a.id, dec!(11)), Posting::credit(b.id, dec!(11))], &entry)
            .await;

        assert!(matches!(result, Err(DbError::InsufficientBalance(_))));
        assert_eq!(repo.get_account(a.id).await.unwrap().unwrap().balance, dec!(10));
        assert_eq!(repo.get_account(b.id).await.unwrap().unwrap().balance, dec!(0));
        assert!(repo.get_account_transactions(a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transactions_newest_first() {
        let (repo, _, a, _) = seeded().await;
        let t0 = Utc::now();

        for (offset, amount) in [(0, dec!(1)), (2, dec!(3)), (1, dec!(2))] {
            let entry = JournalEntry::credit(
                TransactionKind::Deposit,
                a.id,
                amount,
                "Deposit",
                t0 + Duration::seconds(offset),
            );
            repo.apply_movement(&[Posting::credit(a.id, amount)], &entry).await.unwrap();
        }

        let amounts: Vec<Decimal> = repo
            .get_account_transactions(a.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.amount)
            .collect();
        assert_eq!(amounts, vec![dec!(3), dec!(2), dec!(1)]);
    }

    #[tokio::test]
    async fn test_equal_timestamps_list_later_writes_first() {
        let (repo, _, a, _) = seeded().await;
        let at = Utc::now();

        for amount in [dec!(1), dec!(2), dec!(3)] {
            let entry = JournalEntry::credit(TransactionKind::Deposit, a.id, amount, "Deposit", at);
            repo.apply_movement(&[Posting::credit(a.id, amount)], &entry).await.unwrap();
        }

        let amounts: Vec<Decimal> = repo
            .get_account_transactions(a.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.amount)
            .collect();
        assert_eq!(amounts, vec![dec!(3), dec!(2), dec!(1)]);
    }

    fn loan_for(user: &User, account: &Account, due: DateTime<Utc>) -> Loan {
        let id = Uuid::new_v4();
        let installment = |idx: u32, offset: i64| Installment {
            loan_id: id,
            idx,
            due_date: due + Duration::days(offset),
            amount: dec!(60),
            interest_part: dec!(10),
            principal_part: dec!(50),
            penalty: Decimal::ZERO,
            paid: false,
        };
        Loan {
            id,
            user_id: user.id,
            account_id: account.id,
            principal: dec!(100),
            annual_rate: dec!(20),
            term_months: 2,
            start_date: due - Duration::days(30),
            remaining_principal: dec!(100),
            schedule: vec![installment(1, 0), installment(2, 30)],
            created_at: due - Duration::days(30),
        }
    }

    #[tokio::test]
    async fn test_loan_disbursement_and_settlement() {
        let (repo, user, a, _) = seeded().await;
        let due = Utc::now();
        let loan = loan_for(&user, &a, due);
        let disbursement =
            JournalEntry::credit(TransactionKind::LoanDisbursement, a.id, dec!(100), "Loan", due);

        repo.add_loan(&loan, &disbursement).await.unwrap();
        assert_eq!(repo.get_account(a.id).await.unwrap().unwrap().balance, dec!(100));

        let due_now = repo.due_installments(due).await.unwrap();
        assert_eq!(due_now.len(), 1);
        assert_eq!(due_now[0].idx, 1);

        let entry =
            JournalEntry::debit(TransactionKind::LoanInstallment, a.id, dec!(60), "Installment", due);
        let updated = repo
            .mark_installment_paid(loan.id, 1, Decimal::ZERO, &[entry])
            .await
            .unwrap();

        assert_eq!(updated.remaining_principal, dec!(50));
        assert!(updated.installment(1).unwrap().paid);
        assert_eq!(repo.get_account(a.id).await.unwrap().unwrap().balance, dec!(40));
        assert!(repo.due_installments(due).await.unwrap().is_empty());

        let again = repo.mark_installment_paid(loan.id, 1, Decimal::ZERO, &[]).await;
        assert!(matches!(again, Err(DbError::Constraint(_))));
    }

    #[tokio::test]
    async fn test_settlement_debits_amount_plus_penalty() {
        let (repo, user, a, _) = seeded().await;
        let due = Utc::now();
        let loan = loan_for(&user, &a, due);
        let disbursement =
            JournalEntry::credit(TransactionKind::LoanDisbursement, a.id, dec!(100), "Loan", due);
        repo.add_loan(&loan, &disbursement).await.unwrap();

        let updated = repo
            .mark_installment_paid(loan.id, 1, dec!(1.25), &[])
            .await
            .unwrap();

        let settled = updated.installment(1).unwrap();
        assert_eq!(settled.penalty, dec!(1.25));
        assert_eq!(settled.amount_due(), dec!(61.25));
        assert_eq!(repo.get_account(a.id).await.unwrap().unwrap().balance, dec!(38.75));
    }

    #[tokio::test]
    async fn test_settlement_without_funds_changes_nothing() {
        let (repo, user, a, b) = seeded().await;
        let due = Utc::now();
        let loan = loan_for(&user, &a, due);
        let disbursement =
            JournalEntry::credit(TransactionKind::LoanDisbursement, a.id, dec!(100), "Loan", due);
        repo.add_loan(&loan, &disbursement).await.unwrap();

        // Move the disbursement away so the installment cannot be covered
        let drain = JournalEntry::new(TransactionKind::Transfer, Some(a.id), Some(b.id), dec!(95), "t", due);
        repo.apply_movement(&[Posting::debit(a.id, dec!(95)), Posting::credit(b.id, dec!(95))], &drain)
            .await
            .unwrap();

        let entry =
            JournalEntry::debit(TransactionKind::LoanInstallment, a.id, dec!(60), "Installment", due);
        let result = repo.mark_installment_paid(loan.id, 1, dec!(1), &[entry]).await;
        assert!(matches!(result, Err(DbError::InsufficientBalance(_))));

        repo.accrue_penalty(loan.id, 1, dec!(1)).await.unwrap();
        let stored = repo.get_loan(loan.id).await.unwrap().unwrap();
        assert_eq!(stored.installment(1).unwrap().penalty, dec!(1));
        assert!(!stored.installment(1).unwrap().paid);
        assert_eq!(stored.remaining_principal, dec!(100));
        assert_eq!(repo.get_account_transactions(a.id).await.unwrap().len(), 2);
    }
}
