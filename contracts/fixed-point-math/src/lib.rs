#![no_std]

//! 18-decimal fixed-point ("mantissa") arithmetic over `u128`.
//!
//! Every operation is overflow-checked and returns `None` on overflow; every
//! division truncates toward zero. Callers decide how to surface overflow
//! (contracts panic with "math overflow").

/// One whole unit in mantissa terms (1.0 == 10^18).
pub const EXP_SCALE: u128 = 1_000_000_000_000_000_000;

/// `mantissa * scalar / 1e18`, truncating.
pub fn mul_scalar_truncate(mantissa: u128, scalar: u128) -> Option<u128> {
    Some(mantissa.checked_mul(scalar)? / EXP_SCALE)
}

/// `mantissa * scalar / 1e18 + addend`, truncating.
pub fn mul_scalar_truncate_add(mantissa: u128, scalar: u128, addend: u128) -> Option<u128> {
    mul_scalar_truncate(mantissa, scalar)?.checked_add(addend)
}

/// Product of two mantissas, itself a mantissa: `a * b / 1e18`.
pub fn mul_mantissa(a: u128, b: u128) -> Option<u128> {
    Some(a.checked_mul(b)? / EXP_SCALE)
}

/// Scale a numerator up and divide: `num * 1e18 / den`. The workhorse for
/// exchange-rate and share conversions.
pub fn div_to_mantissa(num: u128, den: u128) -> Option<u128> {
    if den == 0 {
        return None;
    }
    Some(num.checked_mul(EXP_SCALE)? / den)
}

/// Ratio of two mantissas as a mantissa: `a * 1e18 / b`.
pub fn fraction(a: u128, b: u128) -> Option<u128> {
    div_to_mantissa(a, b)
}
