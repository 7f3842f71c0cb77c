//! Deposits, transfers and card payments
//!
//! Every operation ends in one [`Repository::apply_movement`] call, which
//! changes the balances and appends the journal entry in the same
//! transaction. Amounts are rounded to cents before validation.

use rust_decimal::Decimal;
use simplebank_db::{Posting, Repository};
use simplebank_types::{Clock, JournalEntry, Principal, TransactionKind};
use std::sync::Arc;
use uuid::Uuid;

use super::cards::CardService;
use super::{load_account, load_owned_account, positive_amount};
use crate::error::{BankError, BankResult};
use crate::numbers::is_card_expired;

pub struct TransactionService {
    repo: Arc<dyn Repository>,
    cards: Arc<CardService>,
    clock: Arc<dyn Clock>,
}

impl TransactionService {
    pub fn new(repo: Arc<dyn Repository>, cards: Arc<CardService>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, cards, clock }
    }

    /// Credit one of the caller's accounts
    pub async fn deposit(
        &self,
        principal: &Principal,
        account_id: Uuid,
        amount: Decimal,
    ) -> BankResult<JournalEntry> {
        let amount = positive_amount(amount)?;
        let account = load_owned_account(self.repo.as_ref(), principal, account_id).await?;

        let entry = JournalEntry::credit(
            TransactionKind::Deposit,
            account.id,
            amount,
            format!("Deposit to account {}", account.number),
            self.clock.now(),
        );
        self.repo
            .apply_movement(&[Posting::credit(account.id, amount)], &entry)
            .await?;

        tracing::info!(account_id = %account.id, amount = %amount, "Deposit completed");
        Ok(entry)
    }

    /// Move money from one of the caller's accounts to any account
    pub async fn transfer(
        &self,
        principal: &Principal,
        from_id: Uuid,
        to_id: Uuid,
        amount: Decimal,
    ) -> BankResult<JournalEntry> {
        let amount = positive_amount(amount)?;
        if from_id == to_id {
            return Err(BankError::validation("Cannot transfer to the same account"));
        }

        let from = load_owned_account(self.repo.as_ref(), principal, from_id).await?;
        let to = load_account(self.repo.as_ref(), to_id).await?;

        let entry = JournalEntry::new(
            TransactionKind::Transfer,
            Some(from.id),
            Some(to.id),
            amount,
            format!("Transfer from {} to {}", from.number, to.number),
            self.clock.now(),
        );
        self.repo
            .apply_movement(
                &[Posting::debit(from.id, amount), Posting::credit(to.id, amount)],
                &entry,
            )
            .await?;

        tracing::info!(
            from_account = %from.id,
            to_account = %to.id,
            amount = %amount,
            "Transfer completed"
        );
        Ok(entry)
    }

    /// Charge a card
    ///
    /// Unknown, tampered and wrong-CVV cards fail with the same error.
    pub async fn card_payment(
        &self,
        principal: &Principal,
        card_id: Uuid,
        cvv: &str,
        amount: Decimal,
        merchant: &str,
    ) -> BankResult<JournalEntry> {
        let amount = positive_amount(amount)?;
        let merchant = merchant.trim();
        if merchant.is_empty() {
            return Err(BankError::validation("Merchant is required"));
        }

        let card = self.cards.verified_card(card_id).await?;
        self.cards.check_cvv(&card, cvv)?;

        let account = load_owned_account(self.repo.as_ref(), principal, card.account_id).await?;

        let now = self.clock.now();
        if is_card_expired(card.expiry_month, card.expiry_year, now) {
            return Err(BankError::validation("Card has expired"));
        }

        let entry = JournalEntry::debit(
            TransactionKind::Payment,
            account.id,
            amount,
            format!("Payment to {}", merchant),
            now,
        );
        self.repo
            .apply_movement(&[Posting::debit(account.id, amount)], &entry)
            .await?;

        tracing::info!(
            card_id = %card.id,
            account_id = %account.id,
            amount = %amount,
            "Card payment completed"
        );
        Ok(entry)
    }

    /// Journal of one of the caller's accounts, newest first
    pub async fn history(&self, principal: &Principal, account_id: Uuid) -> BankResult<Vec<JournalEntry>> {
        let account = load_owned_account(self.repo.as_ref(), principal, account_id).await?;
        Ok(self.repo.get_account_transactions(account.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::harness;
    use chrono::Duration;
    use futures::future::join_all;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_deposit_credits_and_journals() {
        let h = harness();
        let alice = h.user("alice").await;
        let account = h.funded_account(&alice, Decimal::ZERO).await;

        let entry = h
            .services
            .transactions
            .deposit(&alice, account.id, dec!(1000))
            .await
            .unwrap();

        assert_eq!(entry.kind, TransactionKind::Deposit);
        assert_eq!(entry.description, format!("Deposit to account {}", account.number));
        assert_eq!(h.balance(account.id).await, dec!(1000));
    }

    #[tokio::test]
    async fn test_non_positive_amounts_rejected() {
        let h = harness();
        let alice = h.user("alice").await;
        let a = h.funded_account(&alice, dec!(100)).await;
        let b = h.funded_account(&alice, Decimal::ZERO).await;

        for amount in [dec!(0), dec!(-5), dec!(0.004)] {
            assert!(matches!(
                h.services.transactions.deposit(&alice, a.id, amount).await,
                Err(BankError::Validation(_))
            ));
            assert!(matches!(
                h.services.transactions.transfer(&alice, a.id, b.id, amount).await,
                Err(BankError::Validation(_))
            ));
        }
        assert_eq!(h.balance(a.id).await, dec!(100));
    }

    #[tokio::test]
    async fn test_transfer_conserves_money() {
        let h = harness();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;
        let a = h.funded_account(&alice, dec!(1000)).await;
        let b = h.funded_account(&bob, Decimal::ZERO).await;

        let entry = h
            .services
            .transactions
            .transfer(&alice, a.id, b.id, dec!(250))
            .await
            .unwrap();
        assert_eq!(entry.description, format!("Transfer from {} to {}", a.number, b.number));

        assert_eq!(h.balance(a.id).await, dec!(750));
        assert_eq!(h.balance(b.id).await, dec!(250));
        assert_eq!(h.balance(a.id).await + h.balance(b.id).await, dec!(1000));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transfers_never_overdraw() {
        let h = harness();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;
        let a = h.funded_account(&alice, dec!(1000)).await;
        let b = h.funded_account(&bob, dec!(500)).await;

        // 20 x 75 = 1500 requested against 1000 available
        let tx = &h.services.transactions;
        let results = join_all((0..20).map(|_| tx.transfer(&alice, a.id, b.id, dec!(75)))).await;

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 13);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, BankError::InsufficientFunds(_))));

        let (balance_a, balance_b) = (h.balance(a.id).await, h.balance(b.id).await);
        assert!(balance_a >= Decimal::ZERO);
        assert!(balance_b >= Decimal::ZERO);
        assert_eq!(balance_a, dec!(25));
        assert_eq!(balance_a + balance_b, dec!(1500));

        let transfers = tx
            .history(&alice, a.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| matches!(e.kind, TransactionKind::Transfer))
            .count();
        assert_eq!(transfers, succeeded);
    }

    #[tokio::test]
    async fn test_transfer_there_and_back_is_a_no_op() {
        let h = harness();
        let alice = h.user("alice").await;
        let a = h.funded_account(&alice, dec!(300)).await;
        let b = h.funded_account(&alice, dec!(20)).await;

        let tx = &h.services.transactions;
        tx.transfer(&alice, a.id, b.id, dec!(125.50)).await.unwrap();
        tx.transfer(&alice, b.id, a.id, dec!(125.50)).await.unwrap();

        assert_eq!(h.balance(a.id).await, dec!(300));
        assert_eq!(h.balance(b.id).await, dec!(20));
    }

    #[tokio::test]
    async fn test_transfer_rules() {
        let h = harness();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;
        let a = h.funded_account(&alice, dec!(100)).await;
        let b = h.funded_account(&bob, dec!(100)).await;
        let tx = &h.services.transactions;

        assert!(matches!(
            tx.transfer(&alice, a.id, a.id, dec!(1)).await,
            Err(BankError::Validation(_))
        ));
        assert!(matches!(
            tx.transfer(&alice, b.id, a.id, dec!(1)).await,
            Err(BankError::Forbidden(_))
        ));
        assert!(matches!(
            tx.transfer(&alice, a.id, Uuid::new_v4(), dec!(1)).await,
            Err(BankError::NotFound(_))
        ));
        assert!(matches!(
            tx.transfer(&alice, a.id, b.id, dec!(100.01)).await,
            Err(BankError::InsufficientFunds(_))
        ));

        assert_eq!(h.balance(a.id).await, dec!(100));
        assert_eq!(h.balance(b.id).await, dec!(100));
        assert_eq!(tx.history(&alice, a.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deposit_to_foreign_account_forbidden() {
        let h = harness();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;
        let b = h.funded_account(&bob, Decimal::ZERO).await;

        assert!(matches!(
            h.services.transactions.deposit(&alice, b.id, dec!(10)).await,
            Err(BankError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_card_payment() {
        let h = harness();
        let alice = h.user("alice").await;
        let account = h.funded_account(&alice, dec!(750)).await;
        let card = h.services.cards.issue(&alice, account.id).await.unwrap();
        let tx = &h.services.transactions;

        let entry = tx
            .card_payment(&alice, card.card_id, &card.cvv, dec!(100), "Coffee Shop")
            .await
            .unwrap();
        assert_eq!(entry.kind, TransactionKind::Payment);
        assert_eq!(entry.description, "Payment to Coffee Shop");
        assert_eq!(h.balance(account.id).await, dec!(650));

        let wrong_cvv = if card.cvv == "999" { "998" } else { "999" };
        let bad_cvv = tx
            .card_payment(&alice, card.card_id, wrong_cvv, dec!(1), "Shop")
            .await
            .unwrap_err();
        let unknown = tx
            .card_payment(&alice, Uuid::new_v4(), &card.cvv, dec!(1), "Shop")
            .await
            .unwrap_err();
        assert!(matches!(bad_cvv, BankError::Unauthorized(_)));
        assert_eq!(bad_cvv.to_string(), unknown.to_string());

        assert!(matches!(
            tx.card_payment(&alice, card.card_id, &card.cvv, dec!(10000), "Shop").await,
            Err(BankError::InsufficientFunds(_))
        ));
        assert_eq!(h.balance(account.id).await, dec!(650));
    }

    #[tokio::test]
    async fn test_card_payment_by_other_user_forbidden() {
        let h = harness();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;
        let account = h.funded_account(&alice, dec!(100)).await;
        let card = h.services.cards.issue(&alice, account.id).await.unwrap();

        assert!(matches!(
            h.services
                .transactions
                .card_payment(&bob, card.card_id, &card.cvv, dec!(1), "Shop")
                .await,
            Err(BankError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_card_rejected() {
        let h = harness();
        let alice = h.user("alice").await;
        let account = h.funded_account(&alice, dec!(100)).await;
        let card = h.services.cards.issue(&alice, account.id).await.unwrap();

        // Issued January 2024, valid through 2028-01-31 23:59:59
        h.clock.advance(Duration::days(366 * 4 + 30));
        let result = h
            .services
            .transactions
            .card_payment(&alice, card.card_id, &card.cvv, dec!(1), "Shop")
            .await;
        assert!(matches!(result, Err(BankError::Validation(_))));
        assert_eq!(h.balance(account.id).await, dec!(100));
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let h = harness();
        let alice = h.user("alice").await;
        let account = h.funded_account(&alice, dec!(10)).await;
        h.clock.advance(Duration::minutes(1));
        h.services
            .transactions
            .deposit(&alice, account.id, dec!(20))
            .await
            .unwrap();

        let history = h.services.transactions.history(&alice, account.id).await.unwrap();
        let amounts: Vec<_> = history.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![dec!(20), dec!(10)]);
    }
}
