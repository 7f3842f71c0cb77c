//! Business tunables

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Loan pricing and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    /// Fraction of an overdue principal part charged per day
    pub daily_penalty_rate: Decimal,
    /// Percentage points added to the key rate
    pub loan_margin: Decimal,
    /// Key rate assumed when the provider is unavailable
    pub fallback_base_rate: Decimal,
    pub max_term_months: u32,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            daily_penalty_rate: dec!(0.001),
            loan_margin: dec!(5),
            fallback_base_rate: dec!(10),
            max_term_months: 600,
        }
    }
}

/// Billing worker schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub period: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period: Duration::from_secs(12 * 60 * 60),
        }
    }
}
