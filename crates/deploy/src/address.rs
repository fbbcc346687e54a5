//! Account address parsing.

use std::str::FromStr;

use alloy_core::primitives::Address;

use crate::DeployError;

/// Parse a `0x`-prefixed, 40 hex character account address.
///
/// Checksums are not enforced: mixed-case input is accepted as-is.
pub fn parse_address(value: &str) -> Result<Address, DeployError> {
    let invalid = |reason: &str| DeployError::InvalidAddress {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let Some(digits) = value.strip_prefix("0x") else {
        return Err(invalid("expected a 0x prefix"));
    };

    if digits.len() != 40 {
        return Err(invalid("expected 40 hex characters"));
    }

    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid("contains non-hex characters"));
    }

    Address::from_str(value).map_err(|e| invalid(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_valid() {
        assert!(parse_address("0x70997970C51812dc3A010C7d01b50e0d17dc79C8").is_ok());
        assert!(parse_address("0x0000000000000000000000000000000000000000").is_ok());
        assert!(parse_address("0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef").is_ok());
    }

    #[test]
    fn test_parse_address_invalid() {
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("1234567890abcdef1234567890abcdef12345678").is_err());
        assert!(parse_address("0xGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_parse_address_is_validation_error() {
        let err = parse_address("0x1234").unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::ValidationError);
        assert!(err.to_string().contains("0x1234"));
    }
}
