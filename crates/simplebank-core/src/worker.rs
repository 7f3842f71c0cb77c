//! Periodic loan billing
//!
//! The worker ticks once at start and then every configured period. Each
//! tick bills every unpaid installment due by the clock's `now`. A shutdown
//! signal is honoured between installments, never in the middle of one.

use chrono::{DateTime, Utc};
use simplebank_db::Repository;
use simplebank_types::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::error::BankResult;
use crate::services::{BillingOutcome, LoanService};

/// Counts from one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BillingReport {
    pub due: usize,
    pub paid: usize,
    pub deferred: usize,
    pub failed: usize,
}

pub struct BillingWorker {
    repo: Arc<dyn Repository>,
    loans: Arc<LoanService>,
    clock: Arc<dyn Clock>,
    period: Duration,
}

impl BillingWorker {
    pub fn new(
        repo: Arc<dyn Repository>,
        loans: Arc<LoanService>,
        clock: Arc<dyn Clock>,
        period: Duration,
    ) -> Self {
        Self {
            repo,
            loans,
            clock,
            period,
        }
    }

    /// Bill everything due at `now`
    pub async fn run_once(&self, now: DateTime<Utc>) -> BankResult<BillingReport> {
        self.bill_due(now, None).await
    }

    async fn bill_due(
        &self,
        now: DateTime<Utc>,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> BankResult<BillingReport> {
        let due = self.repo.due_installments(now).await?;
        let mut report = BillingReport {
            due: due.len(),
            ..Default::default()
        };

        for installment in &due {
            if shutdown.is_some_and(|rx| *rx.borrow()) {
                tracing::info!("Billing interrupted by shutdown");
                break;
            }

            match self.loans.bill_installment(installment, now).await {
                Ok(BillingOutcome::Paid { .. }) => report.paid += 1,
                Ok(BillingOutcome::Deferred { .. }) => report.deferred += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        loan_id = %installment.loan_id,
                        idx = installment.idx,
                        error = %e,
                        "Billing failed"
                    );
                }
            }
        }

        Ok(report)
    }

    /// Run until `shutdown` becomes true or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(period = ?self.period, "Billing worker started");

        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let now = self.clock.now();
            match self.bill_due(now, Some(&shutdown)).await {
                Ok(report) if report.due > 0 => {
                    tracing::info!(
                        due = report.due,
                        paid = report.paid,
                        deferred = report.deferred,
                        failed = report.failed,
                        "Billing tick complete"
                    );
                }
                Ok(_) => tracing::debug!("No installments due"),
                Err(e) => tracing::error!(error = %e, "Billing tick failed"),
            }

            if *shutdown.borrow() {
                break;
            }
        }

        tracing::info!("Billing worker stopped");
    }
}
