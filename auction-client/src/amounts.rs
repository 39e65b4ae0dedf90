//! Conversion between operator entered decimal amounts and the integer atom
//! amounts the contracts work with. All arithmetic is done on `U256` so that
//! token amounts never pass through a floating point representation.

use ethcontract::U256;
use thiserror::Error;

/// An error converting a decimal string into an atom amount.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum AmountError {
    #[error("'{0}' is not a non-negative decimal number")]
    Malformed(String),
    #[error("'{0}' has more fractional digits than the token's {1} decimals")]
    TooManyDecimals(String, u8),
    #[error("'{0}' does not fit into a uint256 atom amount")]
    Overflow(String),
}

/// Converts a decimal string into atoms of a token with the given decimal
/// precision.
///
/// Inputs with more fractional digits than the token supports are rejected
/// rather than truncated, so the amount a transaction moves is always exactly
/// the amount the operator typed.
pub fn parse_decimal_amount(amount: &str, decimals: u8) -> Result<U256, AmountError> {
    let mut parts = amount.splitn(2, '.');
    let integer = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();

    let malformed = || AmountError::Malformed(amount.to_owned());
    if integer.is_empty() && fraction.is_empty() {
        return Err(malformed());
    }
    if !integer.bytes().all(|byte| byte.is_ascii_digit())
        || !fraction.bytes().all(|byte| byte.is_ascii_digit())
    {
        return Err(malformed());
    }
    if fraction.len() > decimals as usize {
        return Err(AmountError::TooManyDecimals(amount.to_owned(), decimals));
    }

    let overflow = || AmountError::Overflow(amount.to_owned());
    let base = U256::from(10)
        .checked_pow(decimals.into())
        .ok_or_else(overflow)?;
    let integer_value = if integer.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(integer).map_err(|_| overflow())?
    };
    let fraction_value = if fraction.is_empty() {
        U256::zero()
    } else {
        // The fraction is scaled up by the number of decimal places it does
        // not use: "05" with 3 decimals is 50 atoms.
        let scale = U256::from(10)
            .checked_pow((decimals as usize - fraction.len()).into())
            .ok_or_else(overflow)?;
        U256::from_dec_str(fraction)
            .map_err(|_| overflow())?
            .checked_mul(scale)
            .ok_or_else(overflow)?
    };

    integer_value
        .checked_mul(base)
        .and_then(|atoms| atoms.checked_add(fraction_value))
        .ok_or_else(overflow)
}

/// Renders an atom amount back as a decimal string, trimming trailing zeros
/// from the fractional part. Used for logging and for round-tripping parsed
/// amounts in tests.
pub fn format_atoms(atoms: U256, decimals: u8) -> String {
    let decimals = decimals as usize;
    let padded = format!("{:0>width$}", atoms.to_string(), width = decimals + 1);
    let (integer, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        integer.to_owned()
    } else {
        format!("{}.{}", integer, fraction)
    }
}
