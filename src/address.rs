//! Hex address validation and formatting

use crate::error::{EvmError, EvmResult};

use ethers::types::Address;
use ethers::utils::to_checksum;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ADDRESS_RE: Regex = Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap();
}

/// True iff `address` is `0x` followed by exactly 40 hex digits.
///
/// This is a format check only; mixed-case input is not checked against EIP-55.
pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_RE.is_match(address)
}

/// True iff `address` is well formed and all 20 bytes are zero
pub fn is_zero_address(address: &str) -> bool {
    match address.parse::<Address>() {
        Ok(addr) if is_valid_address(address) => addr.is_zero(),
        _ => false,
    }
}

/// Validate and parse an address, naming `field` on failure
pub fn parse_address(field: &str, value: &str) -> EvmResult<Address> {
    if !is_valid_address(value) {
        return Err(EvmError::invalid(format!("{} address", field), value));
    }
    value
        .parse::<Address>()
        .map_err(|_| EvmError::invalid(format!("{} address", field), value))
}

/// Parse an optional destination: empty means contract creation
pub fn parse_optional_address(field: &str, value: &str) -> EvmResult<Option<Address>> {
    if value.is_empty() {
        return Ok(None);
    }
    parse_address(field, value).map(Some)
}

/// EIP-55 checksummed representation
pub fn checksum(address: &Address) -> String {
    to_checksum(address, None)
}

/// Shorten an address for display: first 6 and last 4 characters
pub fn truncate_address(address: &str) -> String {
    if !is_valid_address(address) {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

/// Shorten a hash for display: first 8 and last 8 characters
pub fn truncate_hash(hash: &str) -> String {
    if hash.len() < 16 || !hash.is_ascii() {
        return hash.to_string();
    }
    format!("{}...{}", &hash[..8], &hash[hash.len() - 8..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_valid_address_format() {
        assert!(is_valid_address("0x7161ada3EA6e53E5652A45988DdfF1cE595E09c2"));
        assert!(is_valid_address(&format!("0x{}", "a".repeat(40))));
        assert!(is_valid_address(&format!("0x{}", "F".repeat(40))));

        assert!(!is_valid_address(&format!("0x{}", "a".repeat(39))));
        assert!(!is_valid_address(&format!("0x{}", "a".repeat(41))));
        assert!(!is_valid_address(&"a".repeat(40)));
        assert!(!is_valid_address(&format!("0X{}", "a".repeat(40))));
        assert!(!is_valid_address(&format!("0x{}g", "a".repeat(39))));
        assert!(!is_valid_address(""));
    }

    #[test]
    fn test_checksum_not_enforced() {
        // wrong EIP-55 casing still passes the format check
        assert!(is_valid_address("0x7161ADA3EA6e53E5652A45988DdfF1cE595E09c2"));
    }

    #[test]
    fn test_zero_address() {
        assert!(is_zero_address("0x0000000000000000000000000000000000000000"));
        assert!(!is_zero_address("0x0000000000000000000000000000000000000001"));
        assert!(!is_zero_address("0x00"));
        assert!(!is_zero_address(""));
    }

    #[test]
    fn test_parse_address_names_field() {
        let err = parse_address("to", "0x1234").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputValidation);
        assert!(err.to_string().contains("to address"));
        assert!(err.to_string().contains("0x1234"));
    }

    #[test]
    fn test_optional_address() {
        assert_eq!(parse_optional_address("to", "").unwrap(), None);
        assert!(parse_optional_address("to", "0x7161ada3EA6e53E5652A45988DdfF1cE595E09c2")
            .unwrap()
            .is_some());
        assert!(parse_optional_address("to", "nope").is_err());
    }

    #[test]
    fn test_checksum_roundtrip() {
        let addr = parse_address("owner", "0x7161ada3ea6e53e5652a45988ddff1ce595e09c2").unwrap();
        assert_eq!(checksum(&addr), "0x7161ada3EA6e53E5652A45988DdfF1cE595E09c2");
    }

    #[test]
    fn test_truncation() {
        assert_eq!(
            truncate_address("0x7161ada3EA6e53E5652A45988DdfF1cE595E09c2"),
            "0x7161...09c2"
        );
        assert_eq!(truncate_address("short"), "short");
        assert_eq!(
            truncate_hash("0x1234567890abcdef1234567890abcdef"),
            "0x123456...90abcdef"
        );
    }
}
