//! Simple Bank Core
//!
//! Money movement, cards, loans and everything that prices or bills them.
//!
//! # Layout
//!
//! - [`amortization`]: annuity payment and schedule generation
//! - [`numbers`]: account numbers, card numbers, CVVs and card expiry
//! - [`services`]: the business operations exposed over HTTP
//! - [`worker`]: the periodic loan billing task
//! - [`rates`]: key rate lookup with caching
//! - [`notifier`]: e-mail delivery
//!
//! All state lives behind [`simplebank_db::Repository`]. Services reach time
//! through an injected [`simplebank_types::Clock`] so billing can be tested
//! deterministically.

pub mod amortization;
pub mod config;
pub mod error;
pub mod notifier;
pub mod numbers;
pub mod rates;
pub mod services;
pub mod worker;

pub use config::{BankConfig, WorkerConfig};
pub use error::{BankError, BankResult};
pub use notifier::{notifier_from_config, LogNotifier, Notifier, NotifyError, SmtpConfig, SmtpNotifier};
pub use rates::{
    CachedKeyRateProvider, CbrKeyRateProvider, KeyRateProvider, RateError, RateProviderConfig,
};
pub use services::{
    AccountService, AnalyticsService, BalanceForecast, BankDeps, BankServices, BillingOutcome,
    CardService, FinancialSummary, LoanService, LoginOutcome, NewUser, TransactionService,
    UserService,
};
pub use worker::{BillingReport, BillingWorker};
