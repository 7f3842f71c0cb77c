//! Account opening and listing

use simplebank_db::{DbError, Repository};
use simplebank_types::{Account, Clock, Principal};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{BankError, BankResult};
use crate::numbers::generate_account_number;

/// Attempts at drawing an unused account number
const NUMBER_ATTEMPTS: usize = 5;

pub struct AccountService {
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
}

impl AccountService {
    pub fn new(repo: Arc<dyn Repository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Open a zero-balance account for the caller
    pub async fn open(&self, principal: &Principal) -> BankResult<Account> {
        for _ in 0..NUMBER_ATTEMPTS {
            let account = Account::open(principal.user_id, generate_account_number(), self.clock.now());
            match self.repo.add_account(&account).await {
                Ok(()) => {
                    tracing::info!(
                        user_id = %principal.user_id,
                        account_id = %account.id,
                        "Account opened"
                    );
                    return Ok(account);
                }
                Err(DbError::Duplicate(what)) => {
                    tracing::debug!(conflict = %what, "Account number collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(BankError::Internal(
            "Could not allocate a unique account number".to_string(),
        ))
    }

    /// Accounts of `user_id`; only the user themselves may list them
    pub async fn list(&self, principal: &Principal, user_id: Uuid) -> BankResult<Vec<Account>> {
        if !principal.owns(user_id) {
            return Err(BankError::forbidden("Cannot list another user's accounts"));
        }
        Ok(self.repo.get_accounts_by_user(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numbers::ACCOUNT_NUMBER_PREFIX;
    use crate::services::testing::harness;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_open_and_list() {
        let h = harness();
        let alice = h.user("alice").await;

        let first = h.services.accounts.open(&alice).await.unwrap();
        h.clock.advance(chrono::Duration::seconds(1));
        let second = h.services.accounts.open(&alice).await.unwrap();

        assert_eq!(first.balance, Decimal::ZERO);
        assert!(first.number.starts_with(ACCOUNT_NUMBER_PREFIX));
        assert_ne!(first.number, second.number);

        let listed = h.services.accounts.list(&alice, alice.user_id).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_list_foreign_forbidden() {
        let h = harness();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;

        assert!(matches!(
            h.services.accounts.list(&bob, alice.user_id).await,
            Err(BankError::Forbidden(_))
        ));
    }
}
