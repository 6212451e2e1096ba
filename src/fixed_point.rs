// src/fixed_point.rs
//! Fixed-point helpers shared by every engine.
//!
//! Scaled quantities are 256-bit signed integers, the same width the contracts
//! use. Products are widened to 512 bits before dividing, so `a * b / c` only
//! fails when the quotient itself does not fit.

use alloy::primitives::{aliases::U512, Sign, I256, U256};
use rust_decimal::Decimal;

use crate::error::{Result, RiskError};

/// 2^96.
pub const Q96: I256 = I256::from_raw(U256::from_limbs([0, 1 << 32, 0, 0]));

/// Decimal places kept when projecting X96 values for display.
pub const DISPLAY_SCALE: u32 = 18;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecimalParseError {
    #[error("empty value")]
    Empty,
    #[error("invalid character in {0:?}")]
    InvalidDigit(String),
    #[error("invalid exponent in {0:?}")]
    Exponent(String),
    #[error("value out of range")]
    Overflow,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Rounding {
    Down,
    Up,
}

fn widen(v: U256) -> U512 {
    let mut limbs = [0u64; 8];
    limbs[..4].copy_from_slice(v.as_limbs());
    U512::from_limbs(limbs)
}

fn narrow(v: U512) -> Option<U256> {
    let limbs = v.as_limbs();
    if limbs[4..].iter().any(|l| *l != 0) {
        return None;
    }
    let mut low = [0u64; 4];
    low.copy_from_slice(&limbs[..4]);
    Some(U256::from_limbs(low))
}

fn signed(negative: bool, abs: U256, op: &'static str) -> Result<I256> {
    if abs.is_zero() {
        return Ok(I256::ZERO);
    }
    let sign = if negative { Sign::Negative } else { Sign::Positive };
    I256::checked_from_sign_and_abs(sign, abs).ok_or_else(|| RiskError::overflow(op))
}

fn mul_div(a: I256, b: I256, c: I256, rounding: Rounding, op: &'static str) -> Result<I256> {
    if c.is_zero() {
        return Err(RiskError::div_by_zero(op));
    }
    let negative = a.is_negative() ^ b.is_negative() ^ c.is_negative();
    let product = widen(a.unsigned_abs()) * widen(b.unsigned_abs());
    let (quotient, remainder) = product.div_rem(widen(c.unsigned_abs()));
    let abs = narrow(quotient).ok_or_else(|| RiskError::overflow(op))?;
    let truncated = signed(negative, abs, op)?;
    if remainder.is_zero() {
        return Ok(truncated);
    }
    // down floors; up adds one to the truncated quotient whatever its sign
    let adjusted = match rounding {
        Rounding::Down if negative => truncated.checked_sub(I256::ONE),
        Rounding::Down => Some(truncated),
        Rounding::Up => truncated.checked_add(I256::ONE),
    };
    adjusted.ok_or_else(|| RiskError::overflow(op))
}

/// ⌊a·b/c⌋
pub fn mul_div_down(a: I256, b: I256, c: I256) -> Result<I256> {
    mul_div(a, b, c, Rounding::Down, "mul_div_down")
}

/// `a·b/c` truncated toward zero, plus one when the division is inexact.
///
/// This is the ceiling for non-negative results. A negative inexact result
/// lands one above the truncated quotient, e.g. `(-1000, 3, 7)` gives -427.
pub fn mul_div_up(a: I256, b: I256, c: I256) -> Result<I256> {
    mul_div(a, b, c, Rounding::Up, "mul_div_up")
}

/// `(a - 1) / b + 1`, with `ceil_div(0, b) == 0`.
///
/// Only defined for `a >= 0` and `b > 0`; callers holding a signed value use
/// [`signed_ceil_div`].
pub fn ceil_div(a: I256, b: I256) -> Result<I256> {
    if b.is_zero() {
        return Err(RiskError::div_by_zero("ceil_div"));
    }
    if a.is_negative() || b.is_negative() {
        return Err(RiskError::ArithmeticDegenerate { op: "ceil_div", reason: "negative operand" });
    }
    if a.is_zero() {
        return Ok(I256::ZERO);
    }
    let q = (a - I256::ONE).checked_div(b).ok_or_else(|| RiskError::overflow("ceil_div"))?;
    add(q, I256::ONE)
}

/// Ceiling of `|a| / b` with the sign of `a` put back.
pub fn signed_ceil_div(a: I256, b: I256) -> Result<I256> {
    if a.is_negative() {
        neg(ceil_div(neg(a)?, b)?)
    } else {
        ceil_div(a, b)
    }
}

#[inline]
pub fn min(a: I256, b: I256) -> I256 {
    a.min(b)
}

#[inline]
pub fn max(a: I256, b: I256) -> I256 {
    a.max(b)
}

pub fn abs(a: I256) -> Result<I256> {
    a.checked_abs().ok_or_else(|| RiskError::overflow("abs"))
}

pub(crate) fn add(a: I256, b: I256) -> Result<I256> {
    a.checked_add(b).ok_or_else(|| RiskError::overflow("add"))
}

pub(crate) fn sub(a: I256, b: I256) -> Result<I256> {
    a.checked_sub(b).ok_or_else(|| RiskError::overflow("sub"))
}

pub(crate) fn mul(a: I256, b: I256) -> Result<I256> {
    a.checked_mul(b).ok_or_else(|| RiskError::overflow("mul"))
}

pub(crate) fn neg(a: I256) -> Result<I256> {
    a.checked_neg().ok_or_else(|| RiskError::overflow("neg"))
}

#[inline]
pub fn from_u64(v: u64) -> I256 {
    I256::from_raw(U256::from(v))
}

fn pow10(exp: u32) -> Option<U256> {
    let ten = U256::from(10u8);
    let mut out = U256::from(1u8);
    for _ in 0..exp {
        out = out.checked_mul(ten)?;
    }
    Some(out)
}

/// Moves a scaled integer from `10^from` to `10^to`, flooring when the scale shrinks.
pub fn rescale(value: I256, from: u32, to: u32) -> Result<I256> {
    let factor = |e: u32| -> Result<I256> {
        pow10(e)
            .map(I256::from_raw)
            .filter(|v| !v.is_negative())
            .ok_or_else(|| RiskError::overflow("rescale"))
    };
    if to >= from {
        mul(value, factor(to - from)?)
    } else {
        mul_div_down(value, I256::ONE, factor(from - to)?)
    }
}

/// Parses a decimal string (`"-12.5"`, `"3"`, `"1.5e-7"`) into `value * 10^decimals`,
/// rounding half away from zero on the digits that do not fit.
pub fn to_scaled_int(value: &str, decimals: u32) -> std::result::Result<I256, DecimalParseError> {
    let s = value.trim();
    if s.is_empty() {
        return Err(DecimalParseError::Empty);
    }
    let (negative, unsigned) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(pos) => {
            let exp = unsigned[pos + 1..]
                .parse::<i64>()
                .map_err(|_| DecimalParseError::Exponent(value.to_string()))?;
            (&unsigned[..pos], exp)
        }
        None => (unsigned, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(DecimalParseError::InvalidDigit(value.to_string()));
    }

    let ten = U256::from(10u8);
    let mut digits = U256::ZERO;
    for c in int_part.chars().chain(frac_part.chars()) {
        let d = c.to_digit(10).ok_or_else(|| DecimalParseError::InvalidDigit(value.to_string()))?;
        digits = digits
            .checked_mul(ten)
            .and_then(|v| v.checked_add(U256::from(d)))
            .ok_or(DecimalParseError::Overflow)?;
    }

    let shift = i64::try_from(frac_part.len())
        .ok()
        .and_then(|frac| exponent.checked_add(i64::from(decimals))?.checked_sub(frac))
        .ok_or_else(|| DecimalParseError::Exponent(value.to_string()))?;
    if digits.is_zero() {
        return Ok(I256::ZERO);
    }
    let abs = if shift >= 0 {
        let factor = u32::try_from(shift).ok().and_then(pow10).ok_or(DecimalParseError::Overflow)?;
        digits.checked_mul(factor).ok_or(DecimalParseError::Overflow)?
    } else {
        // 10^78 already exceeds twice any 256-bit value, everything rounds to zero
        match shift.checked_neg().and_then(|s| u32::try_from(s).ok()).and_then(pow10) {
            Some(divisor) => {
                let (q, r) = digits.div_rem(divisor);
                if r >= divisor - r {
                    q + U256::from(1u8)
                } else {
                    q
                }
            }
            None => U256::ZERO,
        }
    };
    if abs.is_zero() {
        return Ok(I256::ZERO);
    }
    let sign = if negative { Sign::Negative } else { Sign::Positive };
    I256::checked_from_sign_and_abs(sign, abs).ok_or(DecimalParseError::Overflow)
}

/// Builds a `Decimal` from `value / 10^scale`, dropping trailing digits when
/// the mantissa is wider than `Decimal` can hold.
fn decimal_from_scaled(value: I256, mut scale: u32) -> Result<Decimal> {
    let (sign, mut abs) = value.into_sign_and_abs();
    let limit = U256::from(u128::MAX >> 32);
    let ten = U256::from(10u8);
    while abs > limit || scale > 28 {
        if scale == 0 {
            return Err(RiskError::overflow("to_decimal"));
        }
        abs /= ten;
        scale -= 1;
    }
    let mantissa = u128::try_from(abs).map_err(|_| RiskError::overflow("to_decimal"))? as i128;
    let mantissa = if matches!(sign, Sign::Negative) { -mantissa } else { mantissa };
    Decimal::try_from_i128_with_scale(mantissa, scale)
        .map(|d| d.normalize())
        .map_err(|_| RiskError::overflow("to_decimal"))
}

/// Inverse of [`to_scaled_int`] for display.
pub fn to_human_decimal(scaled: I256, decimals: u32) -> Result<Decimal> {
    decimal_from_scaled(scaled, decimals)
}

fn rescale_for_display(value: I256, numerator: I256, denominator: I256) -> Result<Decimal> {
    // truncate toward zero so that x and -x project symmetrically
    let magnitude = mul_div_down(abs(value)?, numerator, denominator)?;
    let scaled = if value.is_negative() { neg(magnitude)? } else { magnitude };
    decimal_from_scaled(scaled, DISPLAY_SCALE)
}

/// `x96 / 2^96` as a decimal, e.g. a premium or funding rate.
pub fn x96_to_decimal(x96: I256) -> Result<Decimal> {
    let unit = I256::from_raw(pow10(DISPLAY_SCALE).ok_or_else(|| RiskError::overflow("x96_to_decimal"))?);
    rescale_for_display(x96, unit, Q96)
}

/// Converts a Q96 price quoted in token/usd base units into a USD-per-token decimal.
pub fn to_price_decimal(price_x96: I256, token_decimals: u32, usd_decimals: u32) -> Result<Decimal> {
    let exponent = DISPLAY_SCALE as i64 + token_decimals as i64 - usd_decimals as i64;
    let factor = |e: i64| -> Result<I256> {
        u32::try_from(e)
            .ok()
            .and_then(pow10)
            .map(I256::from_raw)
            .filter(|v| !v.is_negative())
            .ok_or_else(|| RiskError::overflow("to_price_decimal"))
    };
    if exponent >= 0 {
        rescale_for_display(price_x96, factor(exponent)?, Q96)
    } else {
        rescale_for_display(price_x96, I256::ONE, mul(Q96, factor(-exponent)?)?)
    }
}
