//! Per-user balance summaries and a 30-day cash-flow forecast

use chrono::Duration;
use rust_decimal::Decimal;
use serde::Serialize;
use simplebank_db::Repository;
use simplebank_types::{Clock, Principal};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{BankError, BankResult};

const FORECAST_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinancialSummary {
    pub user_id: Uuid,
    pub total_account_balance: Decimal,
    pub number_of_accounts: usize,
    pub total_loan_debt: Decimal,
    pub active_loans: usize,
}

/// Last month's flows projected one month ahead
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceForecast {
    pub current_balance: Decimal,
    pub projected_balance: Decimal,
    pub total_income_last_month: Decimal,
    pub total_expenses_last_month: Decimal,
}

pub struct AnalyticsService {
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
}

impl AnalyticsService {
    pub fn new(repo: Arc<dyn Repository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub async fn summary(&self, principal: &Principal, user_id: Uuid) -> BankResult<FinancialSummary> {
        if !principal.owns(user_id) {
            return Err(BankError::forbidden("Cannot view another user's summary"));
        }

        let accounts = self.repo.get_accounts_by_user(user_id).await?;
        let loans = self.repo.get_loans_by_user(user_id).await?;

        Ok(FinancialSummary {
            user_id,
            total_account_balance: accounts.iter().map(|a| a.balance).sum(),
            number_of_accounts: accounts.len(),
            total_loan_debt: loans.iter().map(|l| l.remaining_principal).sum(),
            active_loans: loans.iter().filter(|l| !l.is_closed()).count(),
        })
    }

    /// Income and expenses of the caller over the last 30 days
    ///
    /// A transfer between two of the caller's own accounts counts on both
    /// sides and therefore nets to zero.
    pub async fn forecast(&self, principal: &Principal) -> BankResult<BalanceForecast> {
        let now = self.clock.now();
        let since = now - Duration::days(FORECAST_WINDOW_DAYS);

        let accounts = self.repo.get_accounts_by_user(principal.user_id).await?;
        let owned: HashSet<Uuid> = accounts.iter().map(|a| a.id).collect();
        let current_balance: Decimal = accounts.iter().map(|a| a.balance).sum();

        let mut seen = HashSet::new();
        let mut income = Decimal::ZERO;
        let mut expenses = Decimal::ZERO;

        for account in &accounts {
            for entry in self.repo.get_account_transactions(account.id).await? {
                // Internal transfers show up in both accounts' journals
                if !seen.insert(entry.id) {
                    continue;
                }
                if entry.timestamp < since || entry.timestamp > now {
                    continue;
                }
                if entry.to_account_id.is_some_and(|id| owned.contains(&id)) {
                    income += entry.amount;
                }
                if entry.from_account_id.is_some_and(|id| owned.contains(&id)) {
                    expenses += entry.amount;
                }
            }
        }

        Ok(BalanceForecast {
            current_balance,
            projected_balance: current_balance + income - expenses,
            total_income_last_month: income,
            total_expenses_last_month: expenses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::harness;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_summary() {
        let h = harness();
        let alice = h.user("alice").await;
        let a = h.funded_account(&alice, dec!(100)).await;
        h.funded_account(&alice, dec!(50.25)).await;
        h.services.loans.apply(&alice, a.id, dec!(1200), 12).await.unwrap();

        let summary = h.services.analytics.summary(&alice, alice.user_id).await.unwrap();
        assert_eq!(summary.number_of_accounts, 2);
        assert_eq!(summary.total_account_balance, dec!(1350.25));
        assert_eq!(summary.total_loan_debt, dec!(1200));
        assert_eq!(summary.active_loans, 1);

        let bob = h.user("bob").await;
        assert!(matches!(
            h.services.analytics.summary(&bob, alice.user_id).await,
            Err(BankError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_forecast_window_and_internal_transfers() {
        let h = harness();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;
        let a = h.funded_account(&alice, dec!(500)).await;
        let b = h.funded_account(&alice, Decimal::ZERO).await;
        let external = h.funded_account(&bob, Decimal::ZERO).await;

        // Falls out of the window once the clock moves on
        h.clock.advance(Duration::days(40));

        let tx = &h.services.transactions;
        tx.deposit(&alice, a.id, dec!(200)).await.unwrap();
        tx.transfer(&alice, a.id, b.id, dec!(100)).await.unwrap();
        tx.transfer(&alice, a.id, external.id, dec!(50)).await.unwrap();

        let forecast = h.services.analytics.forecast(&alice).await.unwrap();
        assert_eq!(forecast.current_balance, dec!(650));
        assert_eq!(forecast.total_income_last_month, dec!(300));
        assert_eq!(forecast.total_expenses_last_month, dec!(150));
        assert_eq!(forecast.projected_balance, dec!(800));
    }
}
