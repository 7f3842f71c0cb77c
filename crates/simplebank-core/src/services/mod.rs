//! Business services
//!
//! Each service owns no state of its own. It validates input, checks that
//! the [`Principal`] may touch the referenced records and hands the write to
//! the [`Repository`] as a single call, so every business operation commits
//! or fails as one unit.

pub mod accounts;
pub mod analytics;
pub mod cards;
pub mod loans;
pub mod transactions;
pub mod users;

pub use accounts::AccountService;
pub use analytics::{AnalyticsService, BalanceForecast, FinancialSummary};
pub use cards::CardService;
pub use loans::{BillingOutcome, LoanService};
pub use transactions::TransactionService;
pub use users::{LoginOutcome, NewUser, UserService};

use rust_decimal::Decimal;
use simplebank_auth::{JwtService, PasswordService};
use simplebank_crypto::{CardCipher, CardMac};
use simplebank_db::Repository;
use simplebank_types::{is_positive_amount, round_money, Account, Clock, Principal};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::BankConfig;
use crate::error::{BankError, BankResult};
use crate::notifier::Notifier;
use crate::rates::KeyRateProvider;

/// Collaborators shared by every service
#[derive(Clone)]
pub struct BankDeps {
    pub repo: Arc<dyn Repository>,
    pub clock: Arc<dyn Clock>,
    pub passwords: Arc<PasswordService>,
    pub jwt: Arc<JwtService>,
    pub cipher: Arc<dyn CardCipher>,
    pub mac: Arc<CardMac>,
    pub rates: Arc<dyn KeyRateProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub config: BankConfig,
}

/// The full service set, wired once at startup
#[derive(Clone)]
pub struct BankServices {
    pub users: Arc<UserService>,
    pub accounts: Arc<AccountService>,
    pub cards: Arc<CardService>,
    pub transactions: Arc<TransactionService>,
    pub loans: Arc<LoanService>,
    pub analytics: Arc<AnalyticsService>,
    pub repo: Arc<dyn Repository>,
}

impl BankServices {
    pub fn new(deps: BankDeps) -> Self {
        let cards = Arc::new(CardService::new(
            deps.repo.clone(),
            deps.cipher.clone(),
            deps.mac.clone(),
            deps.passwords.clone(),
            deps.clock.clone(),
        ));

        Self {
            users: Arc::new(UserService::new(
                deps.repo.clone(),
                deps.passwords.clone(),
                deps.jwt.clone(),
                deps.notifier.clone(),
                deps.clock.clone(),
            )),
            accounts: Arc::new(AccountService::new(deps.repo.clone(), deps.clock.clone())),
            transactions: Arc::new(TransactionService::new(
                deps.repo.clone(),
                cards.clone(),
                deps.clock.clone(),
            )),
            loans: Arc::new(LoanService::new(
                deps.repo.clone(),
                deps.rates.clone(),
                deps.clock.clone(),
                deps.config.clone(),
            )),
            analytics: Arc::new(AnalyticsService::new(deps.repo.clone(), deps.clock.clone())),
            cards,
            repo: deps.repo,
        }
    }
}

/// Round to cents and require a strictly positive result
pub(crate) fn positive_amount(amount: Decimal) -> BankResult<Decimal> {
    let amount = round_money(amount);
    if !is_positive_amount(amount) {
        return Err(BankError::validation("Amount must be positive"));
    }
    Ok(amount)
}

/// Load an account the principal owns: 404 when missing, 403 when foreign
pub(crate) async fn load_owned_account(
    repo: &dyn Repository,
    principal: &Principal,
    account_id: Uuid,
) -> BankResult<Account> {
    let account = load_account(repo, account_id).await?;
    if !principal.owns(account.user_id) {
        return Err(BankError::forbidden("Account belongs to another user"));
    }
    Ok(account)
}

pub(crate) async fn load_account(repo: &dyn Repository, account_id: Uuid) -> BankResult<Account> {
    repo.get_account(account_id)
        .await?
        .ok_or_else(|| BankError::not_found("Account not found"))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Wiring over the in-memory repository

    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use simplebank_auth::{JwtConfig, PasswordConfig};
    use simplebank_crypto::RsaCardCipher;
    use simplebank_db::MemoryRepository;
    use simplebank_types::ManualClock;
    use std::sync::Mutex;

    use crate::notifier::NotifyError;
    use crate::rates::RateError;

    pub struct FixedRate(pub Option<Decimal>);

    #[async_trait]
    impl KeyRateProvider for FixedRate {
        async fn key_rate(&self, _date: NaiveDate) -> Result<Decimal, RateError> {
            self.0.ok_or(RateError::Status(503))
        }
    }

    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    pub struct Harness {
        pub services: BankServices,
        pub repo: Arc<MemoryRepository>,
        pub clock: Arc<ManualClock>,
        pub notifier: Arc<RecordingNotifier>,
        pub mac: Arc<CardMac>,
    }

    pub fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
    }

    pub fn harness_with_rate(rate: Option<Decimal>) -> Harness {
        let repo = Arc::new(MemoryRepository::new());
        let clock = Arc::new(ManualClock::new(start()));
        let notifier = Arc::new(RecordingNotifier::default());
        let mac = Arc::new(CardMac::new(b"test-card-hmac-key"));

        let passwords = Arc::new(PasswordService::new(PasswordConfig {
            memory_cost: 1024,
            time_cost: 1,
            ..Default::default()
        }));
        let jwt = Arc::new(JwtService::new(JwtConfig {
            secret: "test-secret-key-at-least-32-bytes-long!!".to_string(),
            ..Default::default()
        }));

        let services = BankServices::new(BankDeps {
            repo: repo.clone(),
            clock: clock.clone(),
            passwords,
            jwt,
            cipher: Arc::new(RsaCardCipher::generate(1024).unwrap()),
            mac: mac.clone(),
            rates: Arc::new(FixedRate(rate)),
            notifier: notifier.clone(),
            config: BankConfig::default(),
        });

        Harness {
            services,
            repo,
            clock,
            notifier,
            mac,
        }
    }

    pub fn harness() -> Harness {
        harness_with_rate(Some(Decimal::TEN))
    }

    impl Harness {
        pub async fn user(&self, name: &str) -> Principal {
            let user = self
                .services
                .users
                .register(NewUser {
                    username: name.to_string(),
                    email: format!("{}@example.com", name),
                    password: "correct horse".to_string(),
                })
                .await
                .unwrap();
            Principal::new(user.id)
        }

        pub async fn funded_account(&self, owner: &Principal, amount: Decimal) -> Account {
            let account = self.services.accounts.open(owner).await.unwrap();
            if amount > Decimal::ZERO {
                self.services
                    .transactions
                    .deposit(owner, account.id, amount)
                    .await
                    .unwrap();
            }
            self.repo.get_account(account.id).await.unwrap().unwrap()
        }

        pub async fn balance(&self, account_id: Uuid) -> Decimal {
            self.repo.get_account(account_id).await.unwrap().unwrap().balance
        }
    }
}
