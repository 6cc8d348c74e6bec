//! Conversion between minor currency units and the decimal strings some
//! provider APIs use.

use gateway_core::GatewayError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("invalid decimal amount: {0}")]
    Invalid(String),

    #[error("amount {0} has more precision than {1} decimals")]
    TooPrecise(String, u32),

    #[error("amount {0} is out of range")]
    OutOfRange(i64),
}

impl From<AmountError> for GatewayError {
    fn from(err: AmountError) -> Self {
        match err {
            AmountError::OutOfRange(_) => GatewayError::InvalidRequest(err.to_string()),
            _ => GatewayError::Serialization(err.to_string()),
        }
    }
}

/// ISO 4217 currencies without a minor unit
const ZERO_DECIMAL: &[&str] = &["jpy", "krw", "vnd", "clp", "isk", "ugx"];

pub fn decimals(currency: &str) -> u32 {
    if ZERO_DECIMAL.contains(&currency.to_lowercase().as_str()) {
        0
    } else {
        2
    }
}

/// `2500, "usd"` → `"25.00"`
pub fn to_decimal(amount: i64, currency: &str) -> String {
    let places = decimals(currency);
    if places == 0 {
        return amount.to_string();
    }
    let scale = 10_i64.pow(places);
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!(
        "{}{}.{:0width$}",
        sign,
        abs / scale as u64,
        abs % scale as u64,
        width = places as usize
    )
}

/// `"25.5", "usd"` → `2550`
pub fn from_decimal(value: &str, currency: &str) -> Result<i64, AmountError> {
    let places = decimals(currency);
    let trimmed = value.trim();
    let invalid = || AmountError::Invalid(value.to_string());

    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if fraction.len() > places as usize {
        return Err(AmountError::TooPrecise(value.to_string(), places));
    }

    let scale = 10_i64.pow(places);
    let whole: i64 = whole.parse().map_err(|_| invalid())?;
    let fraction: i64 = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", fraction, width = places as usize);
        padded.parse().map_err(|_| invalid())?
    };

    let minor = whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(invalid)?;
    Ok(if negative { -minor } else { minor })
}

/// `amount * basis_points / 10_000 + fixed`, rounded half up.
///
/// Computed in `i128`; a result that does not fit `i64` is `OutOfRange`.
pub fn percentage_fee(amount: i64, basis_points: i64, fixed: i64) -> Result<i64, AmountError> {
    let fee = (i128::from(amount) * i128::from(basis_points) + 5_000) / 10_000 + i128::from(fixed);
    i64::try_from(fee).map_err(|_| AmountError::OutOfRange(amount))
}
