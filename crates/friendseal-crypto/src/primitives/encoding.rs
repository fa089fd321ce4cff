//! Byte/hex conversions and address normalization

use crate::error::CryptoError;

/// Lower-case hex without prefix.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode hex, accepting an optional `0x` prefix and either case.
pub fn from_hex(input: &str) -> Result<Vec<u8>, CryptoError> {
    let trimmed = input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")).unwrap_or(input);
    Ok(hex::decode(trimmed)?)
}

/// Decode hex into a fixed-size array.
pub fn from_hex_array<const N: usize>(input: &str) -> Result<[u8; N], CryptoError> {
    let bytes = from_hex(input)?;
    <[u8; N]>::try_from(bytes.as_slice())
        .map_err(|_| CryptoError::InvalidKeyLength { expected: N, actual: bytes.len() })
}

/// Canonical form of an account address: trimmed and lower-cased.
///
/// Envelope entries, pairwise sessions and persisted records are all keyed
/// by this form, so `0xABC` and `0xabc` name the same party.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip_with_prefix() {
        let encoded = to_hex(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(encoded, "deadbeef");
        assert_eq!(from_hex("0xDEADBEEF").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn hex_array_checks_length() {
        let result = from_hex_array::<4>("aabbcc");
        assert_eq!(result, Err(CryptoError::InvalidKeyLength { expected: 4, actual: 3 }));
    }

    #[test]
    fn odd_hex_rejected() {
        assert!(matches!(from_hex("abc"), Err(CryptoError::InvalidHex { .. })));
    }

    #[test]
    fn addresses_normalize() {
        assert_eq!(normalize_address("  0xAbCdEf "), "0xabcdef");
    }
}
