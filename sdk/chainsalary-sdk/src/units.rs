use crate::error::{Result, SdkError};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

pub const ETHER_DECIMALS: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalaryUnit {
    #[serde(rename = "ETH")]
    Ether,
    #[serde(rename = "wei")]
    Wei,
}

/// Parse a user-entered salary into wei.
/// Everything except digits and `.` is dropped first, so `"1.5 ETH"` works.
pub fn parse_salary(input: &str, unit: SalaryUnit) -> Result<BigUint> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return Err(SdkError::InvalidInput("enter a salary amount".into()));
    }
    match unit {
        SalaryUnit::Ether => parse_units(&cleaned, ETHER_DECIMALS),
        SalaryUnit::Wei => {
            if cleaned.contains('.') {
                return Err(SdkError::InvalidInput("wei amounts must be whole numbers".into()));
            }
            cleaned
                .parse()
                .map_err(|e| SdkError::InvalidInput(format!("invalid wei amount: {e}")))
        },
    }
}

/// Narrow a wei amount to the 64-bit range the encrypted salary field holds
pub fn salary_to_u64(wei: &BigUint) -> Result<u64> {
    u64::try_from(wei).map_err(|_| {
        SdkError::InvalidInput(format!("salary {wei} wei exceeds the 64-bit encrypted range"))
    })
}

/// Decimal string with up to `decimals` fractional digits, scaled to an integer
pub fn parse_units(value: &str, decimals: usize) -> Result<BigUint> {
    let (whole, frac) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(SdkError::InvalidInput(format!("invalid amount {value:?}")));
    }
    if frac.contains('.') {
        return Err(SdkError::InvalidInput(format!("invalid amount {value:?}")));
    }
    if frac.len() > decimals {
        return Err(SdkError::InvalidInput(format!(
            "too many decimal places in {value:?} (max {decimals})"
        )));
    }
    let digits = format!("{}{:0<width$}", whole, frac, width = decimals);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(BigUint::default());
    }
    digits
        .parse()
        .map_err(|e| SdkError::InvalidInput(format!("invalid amount {value:?}: {e}")))
}

/// Render wei as ether, always with at least one fractional digit
pub fn format_ether(wei: &BigUint) -> String {
    format_units(wei, ETHER_DECIMALS)
}

pub fn format_units(value: &BigUint, decimals: usize) -> String {
    let digits = value.to_string();
    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (whole, frac) = padded.split_at(padded.len() - decimals);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        format!("{whole}.0")
    } else {
        format!("{whole}.{frac}")
    }
}
