//! Identifier and card number generation
//!
//! All randomness comes from the operating system CSPRNG.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use rand::{rngs::OsRng, Rng};

/// Fixed prefix of every account number
pub const ACCOUNT_NUMBER_PREFIX: &str = "40817810";

/// Card numbers start with this issuer digit
pub const CARD_BIN: char = '4';

/// Card validity in years from the month of issue
pub const CARD_VALIDITY_YEARS: i32 = 4;

/// Prefix followed by a 10-digit random suffix
pub fn generate_account_number() -> String {
    let suffix: u64 = OsRng.gen_range(1_000_000_000..=9_999_999_999);
    format!("{}{}", ACCOUNT_NUMBER_PREFIX, suffix)
}

/// 16-digit PAN: issuer digit, 14 random digits, Luhn check digit
pub fn generate_card_number() -> String {
    let mut pan = String::with_capacity(16);
    pan.push(CARD_BIN);
    for _ in 0..14 {
        let digit: u32 = OsRng.gen_range(0..10);
        pan.push(char::from(b'0' + digit as u8));
    }
    let check = luhn_check_digit(&pan).unwrap_or(0);
    pan.push(char::from(b'0' + check as u8));
    pan
}

/// Uniformly random three-digit code, `000` to `999`
pub fn generate_cvv() -> String {
    format!("{:03}", OsRng.gen_range(0..1000u32))
}

fn luhn_sum(digits: &str, double_first: bool) -> Option<u32> {
    let mut sum = 0;
    let mut double = double_first;
    for c in digits.chars().rev() {
        let mut d = c.to_digit(10)?;
        if double {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
        double = !double;
    }
    Some(sum)
}

/// Digit that makes `payload` followed by it pass the Luhn check
pub fn luhn_check_digit(payload: &str) -> Option<u32> {
    if payload.is_empty() {
        return None;
    }
    // The check digit will occupy the rightmost position, so the payload's
    // last digit is the first one doubled
    let sum = luhn_sum(payload, true)?;
    Some((10 - sum % 10) % 10)
}

/// Luhn mod-10 validation; empty or non-digit input is invalid
pub fn validate_luhn(number: &str) -> bool {
    if number.is_empty() {
        return false;
    }
    matches!(luhn_sum(number, false), Some(sum) if sum % 10 == 0)
}

/// `(month, year)` of a card issued at `now`
pub fn card_expiry(now: DateTime<Utc>) -> (u32, i32) {
    (now.month(), now.year() + CARD_VALIDITY_YEARS)
}

/// Last valid instant of a card: 23:59:59 UTC on the last day of its month
pub fn card_valid_until(expiry_month: u32, expiry_year: i32) -> Option<DateTime<Utc>> {
    let (next_year, next_month) = if expiry_month == 12 {
        (expiry_year + 1, 1)
    } else {
        (expiry_year, expiry_month + 1)
    };
    let last_day = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()?;
    let end = last_day.and_hms_opt(23, 59, 59)?;
    Some(Utc.from_utc_datetime(&end))
}

/// Whether a card has expired; malformed dates count as expired
pub fn is_card_expired(expiry_month: u32, expiry_year: i32, now: DateTime<Utc>) -> bool {
    if !(1..=12).contains(&expiry_month) {
        return true;
    }
    match card_valid_until(expiry_month, expiry_year) {
        Some(until) => now > until,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_number_shape() {
        for _ in 0..100 {
            let number = generate_account_number();
            assert_eq!(number.len(), 18);
            assert!(number.starts_with(ACCOUNT_NUMBER_PREFIX));
            assert!(number.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(&number[8..9], "0");
        }
    }

    #[test]
    fn test_generated_card_numbers_pass_luhn() {
        for _ in 0..1000 {
            let pan = generate_card_number();
            assert_eq!(pan.len(), 16);
            assert!(pan.starts_with('4'));
            assert!(validate_luhn(&pan), "{}", pan);
        }
    }

    #[test]
    fn test_known_luhn_values() {
        assert!(validate_luhn("4111111111111111"));
        assert!(validate_luhn("79927398713"));
        assert!(!validate_luhn("4111111111111112"));
        assert!(!validate_luhn("4111-1111"));
        assert!(!validate_luhn(""));
        assert_eq!(luhn_check_digit("7992739871"), Some(3));
        assert_eq!(luhn_check_digit("411111111111111"), Some(1));
        assert_eq!(luhn_check_digit(""), None);
    }

    #[test]
    fn test_single_digit_change_breaks_luhn() {
        let pan = generate_card_number();
        let mut digits: Vec<u32> = pan.chars().filter_map(|c| c.to_digit(10)).collect();
        digits[5] = (digits[5] + 1) % 10;
        let altered: String = digits.iter().filter_map(|d| char::from_digit(*d, 10)).collect();
        assert!(!validate_luhn(&altered));
    }

    #[test]
    fn test_cvv_shape() {
        for _ in 0..200 {
            let cvv = generate_cvv();
            assert_eq!(cvv.len(), 3);
            assert!(cvv.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_expiry_is_four_years_out() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap();
        assert_eq!(card_expiry(now), (3, 2028));
    }

    #[test]
    fn test_expiry_boundary() {
        let until = card_valid_until(2, 2028).unwrap();
        assert_eq!(until, Utc.with_ymd_and_hms(2028, 2, 29, 23, 59, 59).unwrap());

        assert!(!is_card_expired(2, 2028, until));
        assert!(is_card_expired(2, 2028, Utc.with_ymd_and_hms(2028, 3, 1, 0, 0, 0).unwrap()));
        assert!(!is_card_expired(12, 2028, Utc.with_ymd_and_hms(2028, 12, 31, 23, 0, 0).unwrap()));
        assert!(is_card_expired(13, 2028, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()));
    }
}
