//! # Unsigned Fixed Point
//!
//! 64.64 unsigned fixed-point arithmetic for deposit scale factors and reward
//! factors. Every node must derive bit-identical values from the same chain,
//! so no floating point is used anywhere in the finalization state.
//!
//! Intermediate products are computed in 256 bits. Results that do not fit
//! saturate; fractional remainders truncate.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

const FRAC_BITS: u32 = 64;
const FRAC_MASK: u128 = (1u128 << FRAC_BITS) - 1;
// Shift amount for 256-bit intermediates.
const WIDE_SHIFT: usize = FRAC_BITS as usize;

/// Unsigned fixed-point number with 64 integer and 64 fractional bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Ufp64(u128);

impl Ufp64 {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1 << FRAC_BITS);
    pub const MAX: Self = Self(u128::MAX);

    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u128 {
        self.0
    }

    pub const fn from_uint(n: u64) -> Self {
        Self((n as u128) << FRAC_BITS)
    }

    /// `num / den`. A zero denominator saturates.
    pub fn from_ratio(num: u64, den: u64) -> Self {
        if den == 0 {
            return Self::MAX;
        }
        Self(((num as u128) << FRAC_BITS) / den as u128)
    }

    /// Integer part, truncating.
    pub fn to_uint(self) -> u64 {
        (self.0 >> FRAC_BITS) as u64
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn add_uint(self, n: u64) -> Self {
        self.add(Self::from_uint(n))
    }

    /// Saturates at zero.
    pub fn sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn mul(self, other: Self) -> Self {
        let product = (U256::from(self.0) * U256::from(other.0)) >> WIDE_SHIFT;
        Self(saturate_u128(product))
    }

    /// `self / other`. Division by zero saturates.
    pub fn div(self, other: Self) -> Self {
        if other.0 == 0 {
            return Self::MAX;
        }
        let quotient = (U256::from(self.0) << WIDE_SHIFT) / U256::from(other.0);
        Self(saturate_u128(quotient))
    }

    pub fn mul_uint(self, n: u64) -> Self {
        Self(self.0.saturating_mul(n as u128))
    }

    /// Division by zero saturates.
    pub fn div_uint(self, n: u64) -> Self {
        if n == 0 {
            return Self::MAX;
        }
        Self(self.0 / n as u128)
    }

    /// `self * n`, truncated to an integer.
    pub fn mul_to_uint(self, n: u64) -> u64 {
        let product = (U256::from(self.0) * U256::from(n)) >> WIDE_SHIFT;
        saturate_u64(product)
    }

    /// `n / divisor`, truncated to an integer. Division by zero saturates.
    pub fn div_to_uint(n: u64, divisor: Self) -> u64 {
        if divisor.0 == 0 {
            return u64::MAX;
        }
        let quotient = (U256::from(n) << WIDE_SHIFT) / U256::from(divisor.0);
        saturate_u64(quotient)
    }

    /// Square root of an integer.
    pub fn sqrt_uint(n: u64) -> Self {
        let root = (U256::from(n) << (2 * WIDE_SHIFT)).integer_sqrt();
        Self(saturate_u128(root))
    }

    pub fn min(self, other: Self) -> Self {
        std::cmp::min(self, other)
    }
}

fn saturate_u128(value: U256) -> u128 {
    if value > U256::from(u128::MAX) {
        u128::MAX
    } else {
        value.low_u128()
    }
}

fn saturate_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.low_u64()
    }
}

impl fmt::Display for Ufp64 {
    /// Integer part plus eight truncated decimal digits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frac = ((self.0 & FRAC_MASK) * 100_000_000) >> FRAC_BITS;
        write!(f, "{}.{:08}", self.0 >> FRAC_BITS, frac)
    }
}
