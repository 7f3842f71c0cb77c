//! Annuity amortization
//!
//! Level monthly payments where each installment splits into interest on the
//! outstanding principal and a principal repayment. Rounding drift is
//! absorbed by the final installment so that principal parts sum exactly to
//! the loan principal.

use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use simplebank_types::{round_money, Installment};
use uuid::Uuid;

use crate::error::{BankError, BankResult};

fn overflow() -> BankError {
    BankError::validation("Loan rate and term are out of range")
}

/// Monthly interest rate for an annual rate given in percent
pub fn monthly_rate(annual_rate: Decimal) -> Decimal {
    annual_rate / Decimal::from(12) / Decimal::ONE_HUNDRED
}

/// Level monthly payment `M = P · i(1+i)^n / ((1+i)^n − 1)`, rounded
///
/// Rate and term combinations whose growth factor leaves the `Decimal`
/// range are rejected as invalid input.
pub fn monthly_payment(
    principal: Decimal,
    annual_rate: Decimal,
    term_months: u32,
) -> BankResult<Decimal> {
    if term_months == 0 {
        return Ok(Decimal::ZERO);
    }

    let i = monthly_rate(annual_rate);
    if i.is_zero() {
        return Ok(round_money(principal / Decimal::from(term_months)));
    }

    let base = Decimal::ONE + i;
    let mut growth = Decimal::ONE;
    for _ in 0..term_months {
        growth = growth.checked_mul(base).ok_or_else(overflow)?;
    }

    let factor = i
        .checked_mul(growth)
        .and_then(|n| n.checked_div(growth - Decimal::ONE))
        .ok_or_else(overflow)?;
    let payment = principal.checked_mul(factor).ok_or_else(overflow)?;
    Ok(round_money(payment))
}

/// Full repayment schedule, due dates one calendar month apart
pub fn build_schedule(
    loan_id: Uuid,
    principal: Decimal,
    annual_rate: Decimal,
    term_months: u32,
    start_date: DateTime<Utc>,
) -> BankResult<Vec<Installment>> {
    let i = monthly_rate(annual_rate);
    let payment = monthly_payment(principal, annual_rate, term_months)?;

    let mut schedule = Vec::with_capacity(term_months as usize);
    let mut remaining = principal;

    for k in 1..=term_months {
        let interest_part = round_money(remaining.checked_mul(i).ok_or_else(overflow)?);
        let mut principal_part = payment - interest_part;
        let mut amount = payment;

        if k == term_months || remaining - principal_part <= Decimal::ZERO {
            principal_part = remaining;
            amount = round_money(principal_part + interest_part);
        }

        remaining -= principal_part;

        schedule.push(Installment {
            loan_id,
            idx: k,
            due_date: start_date
                .checked_add_months(Months::new(k))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            amount,
            interest_part,
            principal_part,
            penalty: Decimal::ZERO,
            paid: false,
        });

        if remaining <= Decimal::ZERO {
            break;
        }
    }

    Ok(schedule)
}
