//! Fixed-point helpers.
//!
//! Price ratios are integers scaled by 10^18. The oracle feed reports
//! 8-decimal values which are lifted to 18 decimals by multiplying with
//! 10^10. Division always truncates toward zero and never traps: every
//! divisor goes through [`checked_div`].

use num_bigint::BigInt;
use num_traits::Zero;
use thiserror::Error;

/// 10^18, the scale of every price ratio.
pub const SCALE_18: u64 = 1_000_000_000_000_000_000;

/// 10^10, lifts an 8-decimal feed answer to 18 decimals.
pub const SCALE_10: u64 = 10_000_000_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("division by zero while computing {context}")]
    DivisionByZero { context: &'static str },

    #[error("overflow while computing {context}")]
    Overflow { context: &'static str },
}

/// Truncating division with an explicit zero check.
pub fn checked_div(
    dividend: &BigInt,
    divisor: &BigInt,
    context: &'static str,
) -> Result<BigInt, ArithmeticError> {
    if divisor.is_zero() {
        return Err(ArithmeticError::DivisionByZero { context });
    }
    Ok(dividend / divisor)
}
