//! PAN masking

/// Shown when the stored PAN cannot be recovered
pub const FULLY_MASKED_PAN: &str = "**** **** **** ****";

/// Reduce a PAN to `**** **** **** DDDD`
pub fn mask_pan(pan: &str) -> String {
    let digits: Vec<char> = pan.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return FULLY_MASKED_PAN.to_string();
    }
    let last_four: String = digits[digits.len() - 4..].iter().collect();
    format!("**** **** **** {}", last_four)
}
