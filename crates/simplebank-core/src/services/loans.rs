//! Loan origination and installment billing

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use simplebank_db::{DbError, Repository};
use simplebank_types::{round_money, Clock, Installment, JournalEntry, Loan, Principal, TransactionKind};
use std::sync::Arc;
use uuid::Uuid;

use super::{load_owned_account, positive_amount};
use crate::amortization::build_schedule;
use crate::config::BankConfig;
use crate::error::{BankError, BankResult};
use crate::rates::KeyRateProvider;

/// Result of one billing attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingOutcome {
    /// The installment was debited and marked paid
    Paid {
        loan_id: Uuid,
        idx: u32,
        remaining_principal: Decimal,
    },
    /// The balance did not cover it; the penalty owed so far was recorded
    Deferred {
        loan_id: Uuid,
        idx: u32,
        penalty: Decimal,
    },
}

/// Late fee owed on an installment at `now`
///
/// Recomputed from the due date on every attempt, so repeated billing never
/// compounds it.
pub fn penalty_for(installment: &Installment, now: DateTime<Utc>, daily_rate: Decimal) -> Decimal {
    let days_overdue = (now - installment.due_date).num_days().max(0);
    round_money(installment.principal_part * daily_rate * Decimal::from(days_overdue))
}

pub struct LoanService {
    repo: Arc<dyn Repository>,
    rates: Arc<dyn KeyRateProvider>,
    clock: Arc<dyn Clock>,
    config: BankConfig,
}

impl LoanService {
    pub fn new(
        repo: Arc<dyn Repository>,
        rates: Arc<dyn KeyRateProvider>,
        clock: Arc<dyn Clock>,
        config: BankConfig,
    ) -> Self {
        Self {
            repo,
            rates,
            clock,
            config,
        }
    }

    /// Annual loan rate on `date`: key rate plus margin
    pub async fn annual_rate(&self, date: NaiveDate) -> Decimal {
        let base = match self.rates.key_rate(date).await {
            Ok(rate) => rate,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    fallback = %self.config.fallback_base_rate,
                    "Key rate unavailable, using fallback"
                );
                self.config.fallback_base_rate
            }
        };
        base + self.config.loan_margin
    }

    /// Originate a loan and disburse it to one of the caller's accounts
    pub async fn apply(
        &self,
        principal: &Principal,
        account_id: Uuid,
        amount: Decimal,
        term_months: u32,
    ) -> BankResult<Loan> {
        let amount = positive_amount(amount)?;
        if term_months == 0 || term_months > self.config.max_term_months {
            return Err(BankError::validation(format!(
                "Term must be between 1 and {} months",
                self.config.max_term_months
            )));
        }

        let account = load_owned_account(self.repo.as_ref(), principal, account_id).await?;

        let now = self.clock.now();
        let annual_rate = self.annual_rate(now.date_naive()).await;

        let loan_id = Uuid::new_v4();
        let schedule = build_schedule(loan_id, amount, annual_rate, term_months, now)?;
        if schedule.len() != term_months as usize {
            return Err(BankError::validation(
                "Principal is too small for the requested term",
            ));
        }

        let loan = Loan {
            id: loan_id,
            user_id: principal.user_id,
            account_id: account.id,
            principal: amount,
            annual_rate,
            term_months,
            start_date: now,
            remaining_principal: amount,
            schedule,
            created_at: now,
        };

        let disbursement = JournalEntry::credit(
            TransactionKind::LoanDisbursement,
            account.id,
            amount,
            format!("Loan disbursement (ID: {})", loan.id),
            now,
        );
        self.repo.add_loan(&loan, &disbursement).await?;

        tracing::info!(
            user_id = %principal.user_id,
            loan_id = %loan.id,
            principal = %amount,
            annual_rate = %annual_rate,
            term_months,
            "Loan disbursed"
        );
        Ok(loan)
    }

    /// Installments of one of the caller's loans
    pub async fn schedule(&self, principal: &Principal, loan_id: Uuid) -> BankResult<Vec<Installment>> {
        let loan = self
            .repo
            .get_loan(loan_id)
            .await?
            .ok_or_else(|| BankError::not_found("Loan not found"))?;
        if !principal.owns(loan.user_id) {
            return Err(BankError::forbidden("Loan belongs to another user"));
        }
        Ok(loan.schedule)
    }

    /// Try to settle one due installment from the loan account
    pub async fn bill_installment(
        &self,
        installment: &Installment,
        now: DateTime<Utc>,
    ) -> BankResult<BillingOutcome> {
        let loan = self
            .repo
            .get_loan(installment.loan_id)
            .await?
            .ok_or_else(|| BankError::not_found("Loan not found"))?;

        let penalty = penalty_for(installment, now, self.config.daily_penalty_rate);

        let mut journal = vec![JournalEntry::debit(
            TransactionKind::LoanInstallment,
            loan.account_id,
            installment.amount,
            format!("Loan installment #{} (ID: {})", installment.idx, loan.id),
            now,
        )];
        if penalty > Decimal::ZERO {
            journal.push(JournalEntry::debit(
                TransactionKind::Penalty,
                loan.account_id,
                penalty,
                format!("Late payment penalty #{} (ID: {})", installment.idx, loan.id),
                now,
            ));
        }

        match self
            .repo
            .mark_installment_paid(loan.id, installment.idx, penalty, &journal)
            .await
        {
            Ok(updated) => {
                tracing::info!(
                    loan_id = %loan.id,
                    idx = installment.idx,
                    amount = %installment.amount,
                    penalty = %penalty,
                    remaining = %updated.remaining_principal,
                    "Installment paid"
                );
                if updated.is_closed() {
                    tracing::info!(loan_id = %loan.id, "Loan repaid");
                }
                Ok(BillingOutcome::Paid {
                    loan_id: loan.id,
                    idx: installment.idx,
                    remaining_principal: updated.remaining_principal,
                })
            }
            Err(DbError::InsufficientBalance(_)) => {
                self.repo
                    .accrue_penalty(loan.id, installment.idx, penalty)
                    .await?;
                tracing::warn!(
                    loan_id = %loan.id,
                    idx = installment.idx,
                    penalty = %penalty,
                    "Insufficient funds for installment"
                );
                Ok(BillingOutcome::Deferred {
                    loan_id: loan.id,
                    idx: installment.idx,
                    penalty,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
