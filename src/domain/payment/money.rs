//! Integer-cent amounts and their decimal wire representation.
//!
//! The gateway speaks decimal strings ("88.88"); the domain stores i64
//! cents and never touches floating point.

use super::PaymentError;

/// Formats cents as the gateway's decimal string, always two places.
pub fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parses a gateway decimal amount into cents.
///
/// Accepts up to two fraction digits ("88", "88.8", "88.88").
///
/// # Errors
///
/// Returns `PaymentError::Validation` for empty, negative, non-numeric or
/// over-precise input.
pub fn parse_amount(s: &str) -> Result<i64, PaymentError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(PaymentError::validation("amount", "empty amount"));
    }
    if trimmed.starts_with('-') {
        return Err(PaymentError::validation("amount", "negative amount"));
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if fraction.len() > 2 {
        return Err(PaymentError::validation(
            "amount",
            format!("more than two fraction digits: '{}'", s),
        ));
    }

    let whole: i64 = whole
        .parse()
        .map_err(|_| PaymentError::validation("amount", format!("not a number: '{}'", s)))?;
    let fraction_cents: i64 = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{:0<2}", fraction);
        padded
            .parse()
            .map_err(|_| PaymentError::validation("amount", format!("not a number: '{}'", s)))?
    };

    whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(fraction_cents))
        .ok_or_else(|| PaymentError::validation("amount", "amount overflow"))
}
