//! Minimal ABI encoding for the two read calls the indexer makes.

use num_bigint::{BigInt, BigUint};

use crate::SourceError;

/// `getReserves()` on a Uniswap V2 style pair.
pub const GET_RESERVES_SELECTOR: &str = "0x0902f1ac";

/// `latestAnswer()` on a Chainlink style aggregator proxy.
pub const LATEST_ANSWER_SELECTOR: &str = "0x50d25bcd";

const WORD: usize = 32;

pub fn decode_hex(data: &str) -> Result<Vec<u8>, SourceError> {
    let body = data.strip_prefix("0x").unwrap_or(data);
    Ok(hex::decode(body)?)
}

fn word(data: &[u8], index: usize) -> Result<&[u8], SourceError> {
    let start = index * WORD;
    data.get(start..start + WORD).ok_or_else(|| {
        SourceError::InvalidResponse(format!(
            "expected at least {} bytes of return data, got {}",
            start + WORD,
            data.len()
        ))
    })
}

/// `(uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast)`; only
/// the two reserves are used.
pub fn decode_reserves(data: &[u8]) -> Result<(BigUint, BigUint), SourceError> {
    let reserve0 = BigUint::from_bytes_be(word(data, 0)?);
    let reserve1 = BigUint::from_bytes_be(word(data, 1)?);
    Ok((reserve0, reserve1))
}

/// A single `int256` return value, two's complement.
pub fn decode_int256(data: &[u8]) -> Result<BigInt, SourceError> {
    Ok(BigInt::from_signed_bytes_be(word(data, 0)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(v: u128) -> String {
        format!("{:064x}", v)
    }

    #[test]
    fn decodes_reserves_words() {
        let r0: u128 = 2_000_000_000_000_000_000_000;
        let r1: u128 = 1_000_000_000_000_000_000_000;
        let hex = format!("0x{}{}{}", padded(r0), padded(r1), padded(1_650_000_000));

        let data = decode_hex(&hex).unwrap();
        let (a, b) = decode_reserves(&data).unwrap();

        assert_eq!(a, BigUint::from(r0));
        assert_eq!(b, BigUint::from(r1));
    }

    #[test]
    fn decodes_positive_answer() {
        let data = decode_hex(&format!("0x{}", padded(300_000_000))).unwrap();
        assert_eq!(decode_int256(&data).unwrap(), BigInt::from(300_000_000));
    }

    #[test]
    fn decodes_negative_answer() {
        // -1 as int256
        let data = decode_hex(&format!("0x{}", "f".repeat(64))).unwrap();
        assert_eq!(decode_int256(&data).unwrap(), BigInt::from(-1));
    }

    #[test]
    fn short_return_data_is_invalid() {
        let data = decode_hex("0x00ff").unwrap();
        let err = decode_reserves(&data).unwrap_err();
        assert!(matches!(err, SourceError::InvalidResponse(_)));
    }

    #[test]
    fn malformed_hex_is_reported() {
        assert!(matches!(decode_hex("0xzz"), Err(SourceError::Hex(_))));
    }
}
