use std::num::NonZeroU32;

/// Integer-prefix parsing: leading whitespace, optional sign, then digits up to
/// the first non-digit. `0x` switches to hex. `None` is "not a number"; a
/// prefix too large for `i64` saturates.
pub fn parse_amount(value: &str) -> Option<i64> {
    let s = value.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, digits) = match rest.get(..2) {
        Some("0x") | Some("0X") => (16, &rest[2..]),
        _ => (10, rest),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_digit(radix))
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value = digits[..end]
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0i64, |acc, digit| {
            let acc = acc.saturating_mul(i64::from(radix));
            if negative {
                acc.saturating_sub(i64::from(digit))
            } else {
                acc.saturating_add(i64::from(digit))
            }
        });
    Some(value)
}

/// Whole-string integer, for when partially numeric input should be refused.
pub fn parse_amount_strict(value: &str) -> Result<i64, String> {
    let raw = value.trim();
    if raw.is_empty() {
        return Err("amount is empty".to_string());
    }
    raw.parse::<i64>()
        .map_err(|_| format!("invalid amount '{raw}', expected an integer"))
}

/// Optional filter bound. Empty input and `-` mean "no bound".
pub fn parse_bound(value: &str) -> Result<Option<i64>, String> {
    let raw = value.trim();
    if raw.is_empty() || raw == "-" {
        return Ok(None);
    }
    raw.parse::<i64>()
        .map(Some)
        .map_err(|_| format!("invalid amount bound '{raw}'"))
}

pub fn parse_page(value: &str) -> Result<NonZeroU32, String> {
    let raw = value.trim();
    raw.parse::<NonZeroU32>()
        .map_err(|_| format!("invalid page '{raw}', expected a positive integer"))
}

pub fn check_bounds(min: Option<i64>, max: Option<i64>) -> Result<(), String> {
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(format!("min amount {min} is greater than max amount {max}"));
        }
    }
    Ok(())
}
