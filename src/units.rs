//! Decimal string <-> integer amount conversions

use crate::error::{EvmError, EvmResult};

use ethers::types::U256;

/// Decimal places of one ether
pub const ETHER_DECIMALS: u32 = 18;
/// Decimal places of one gwei
pub const GWEI_DECIMALS: u32 = 9;

/// Convert a decimal string into an integer amount with `decimals` places.
///
/// Digits past `decimals` are truncated, never rounded:
/// `to_decimals("1.234567", 4)` is `12345`.
pub fn to_decimals(value: &str, decimals: u32) -> EvmResult<U256> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(U256::zero());
    }

    let unsigned = match trimmed.as_bytes()[0] {
        b'-' => return Err(EvmError::invalid("amount (negative)", value)),
        b'+' => &trimmed[1..],
        _ => trimmed,
    };

    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (unsigned, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(EvmError::invalid("amount", value));
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EvmError::invalid("amount", value));
    }

    let places = decimals as usize;
    let mut frac: String = frac_part.chars().take(places).collect();
    while frac.len() < places {
        frac.push('0');
    }

    let merged = format!("{}{}", int_part, frac);
    let merged = merged.trim_start_matches('0');
    if merged.is_empty() {
        return Ok(U256::zero());
    }

    U256::from_dec_str(merged).map_err(|_| EvmError::invalid("amount (overflow)", value))
}

/// Render an integer amount with `decimals` places, trailing zeros trimmed
pub fn from_decimals(value: U256, decimals: u32) -> String {
    let digits = value.to_string();
    let places = decimals as usize;
    if places == 0 {
        return digits;
    }

    let padded = if digits.len() <= places {
        format!("{}{}", "0".repeat(places - digits.len() + 1), digits)
    } else {
        digits
    };

    let split = padded.len() - places;
    let (int_part, frac_part) = padded.split_at(split);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}

/// Parse an ether amount into wei
pub fn parse_ether(value: &str) -> EvmResult<U256> {
    to_decimals(value, ETHER_DECIMALS)
}

/// Format wei as ether
pub fn format_ether(wei: U256) -> String {
    from_decimals(wei, ETHER_DECIMALS)
}

/// Parse a gwei amount into wei
pub fn parse_gwei(value: &str) -> EvmResult<U256> {
    to_decimals(value, GWEI_DECIMALS)
}

/// Format wei as gwei
pub fn format_gwei(wei: U256) -> String {
    from_decimals(wei, GWEI_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_decimals_pads() {
        assert_eq!(to_decimals("1.23", 6).unwrap(), U256::from(1_230_000u64));
        assert_eq!(to_decimals("1", 6).unwrap(), U256::from(1_000_000u64));
        assert_eq!(to_decimals(".5", 2).unwrap(), U256::from(50u64));
        assert_eq!(to_decimals("+2.", 1).unwrap(), U256::from(20u64));
    }

    #[test]
    fn test_to_decimals_truncates() {
        assert_eq!(to_decimals("1.234567", 4).unwrap(), U256::from(12_345u64));
        assert_eq!(to_decimals("0.999", 2).unwrap(), U256::from(99u64));
        assert_eq!(to_decimals("0.0001", 2).unwrap(), U256::zero());
    }

    #[test]
    fn test_to_decimals_rejects_garbage() {
        assert!(to_decimals("-1", 6).is_err());
        assert!(to_decimals("1.2.3", 6).is_err());
        assert!(to_decimals("abc", 6).is_err());
        assert!(to_decimals(".", 6).is_err());
        assert_eq!(to_decimals("", 6).unwrap(), U256::zero());
    }

    #[test]
    fn test_from_decimals() {
        assert_eq!(from_decimals(U256::from(1_230_000u64), 6), "1.23");
        assert_eq!(from_decimals(U256::from(5u64), 3), "0.005");
        assert_eq!(from_decimals(U256::zero(), 18), "0");
        assert_eq!(from_decimals(U256::from(42u64), 0), "42");
    }

    #[test]
    fn test_ether_and_gwei() {
        let wei = parse_ether("1.5").unwrap();
        assert_eq!(wei, U256::from(1_500_000_000_000_000_000u128));
        assert_eq!(format_ether(wei), "1.5");
        assert_eq!(parse_gwei("2").unwrap(), U256::from(2_000_000_000u64));
        assert_eq!(format_gwei(U256::from(1_500_000_000u64)), "1.5");
    }
}
