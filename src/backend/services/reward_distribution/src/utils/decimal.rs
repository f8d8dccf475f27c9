//! Deterministic fixed-point decimal.
//!
//! `Dec` is a non-negative integer scaled by `10^18`, backed by a 256-bit
//! unsigned integer. Every operation is exact integer arithmetic; division and
//! multiplication truncate toward zero so a sum of computed shares can never
//! exceed the amount they were carved from. No floating point is involved, so
//! every replica produces bit-identical results.

use std::fmt;
use std::str::FromStr;

use primitive_types::{U256, U512};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::utils::errors::ArithmeticError;

/// Number of decimal places carried by `Dec`.
pub const PRECISION: usize = 18;

fn precision_multiplier() -> U256 {
    U256::exp10(PRECISION)
}

fn narrow(value: U512) -> Result<U256, ArithmeticError> {
    U256::try_from(value).map_err(|_| ArithmeticError::Overflow)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dec(U256);

impl Dec {
    pub fn zero() -> Self {
        Dec(U256::zero())
    }

    pub fn one() -> Self {
        Dec(precision_multiplier())
    }

    /// Integer value `n` as a decimal.
    pub fn from_int(n: u128) -> Self {
        // u128::MAX * 10^18 < 2^256, cannot overflow
        Dec(U256::from(n) * precision_multiplier())
    }

    /// `numerator / 10^decimals`, e.g. `with_prec(40, 2)` is `0.40`.
    pub fn with_prec(numerator: u128, decimals: usize) -> Result<Self, ArithmeticError> {
        if decimals > PRECISION {
            return Err(ArithmeticError::InvalidDecimal(format!(
                "precision {} exceeds {}",
                decimals, PRECISION
            )));
        }
        let scale = U256::exp10(PRECISION - decimals);
        U256::from(numerator)
            .checked_mul(scale)
            .map(Dec)
            .ok_or(ArithmeticError::Overflow)
    }

    /// Raw scaled integer, i.e. `self * 10^18`.
    pub fn raw(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(&self, other: &Dec) -> Result<Dec, ArithmeticError> {
        self.0
            .checked_add(other.0)
            .map(Dec)
            .ok_or(ArithmeticError::Overflow)
    }

    /// Fails with `NegativeAmount` instead of clamping at zero.
    pub fn checked_sub(&self, other: &Dec) -> Result<Dec, ArithmeticError> {
        self.0
            .checked_sub(other.0)
            .map(Dec)
            .ok_or(ArithmeticError::NegativeAmount)
    }

    /// `self * other`, truncating below the 18th decimal place.
    pub fn mul_truncate(&self, other: &Dec) -> Result<Dec, ArithmeticError> {
        let product = self.0.full_mul(other.0) / U512::from(precision_multiplier());
        narrow(product).map(Dec)
    }

    pub fn mul_int(&self, n: u128) -> Result<Dec, ArithmeticError> {
        narrow(self.0.full_mul(U256::from(n))).map(Dec)
    }

    /// `self / other`, truncating toward zero.
    pub fn quo_truncate(&self, other: &Dec) -> Result<Dec, ArithmeticError> {
        if other.is_zero() {
            return Err(ArithmeticError::DivisionByZero);
        }
        let quotient = self.0.full_mul(precision_multiplier()) / U512::from(other.0);
        narrow(quotient).map(Dec)
    }

    pub fn quo_int_truncate(&self, n: u128) -> Result<Dec, ArithmeticError> {
        if n == 0 {
            return Err(ArithmeticError::DivisionByZero);
        }
        Ok(Dec(self.0 / U256::from(n)))
    }

    /// Splits into the integer part and the discarded fractional remainder.
    pub fn truncate(&self) -> Result<(u128, Dec), ArithmeticError> {
        let scale = precision_multiplier();
        let integer = self.0 / scale;
        let remainder = self.0 % scale;
        if integer > U256::from(u128::MAX) {
            return Err(ArithmeticError::Overflow);
        }
        Ok((integer.as_u128(), Dec(remainder)))
    }
}

/// `floor(a * b / c)` over integers without intermediate overflow.
pub fn mul_div_floor(a: u128, b: u128, c: u128) -> Result<u128, ArithmeticError> {
    if c == 0 {
        return Err(ArithmeticError::DivisionByZero);
    }
    // a * b < 2^256, fits without overflow
    let quotient = U256::from(a) * U256::from(b) / U256::from(c);
    if quotient > U256::from(u128::MAX) {
        return Err(ArithmeticError::Overflow);
    }
    Ok(quotient.as_u128())
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = precision_multiplier();
        let integer = self.0 / scale;
        let fraction = self.0 % scale;
        write!(
            f,
            "{}.{:0>width$}",
            integer,
            fraction.to_string(),
            width = PRECISION
        )
    }
}

impl FromStr for Dec {
    type Err = ArithmeticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ArithmeticError::InvalidDecimal(s.to_string());
        let (integer, fraction) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if integer.is_empty()
            || !integer.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
            || fraction.len() > PRECISION
            || (s.contains('.') && fraction.is_empty())
        {
            return Err(invalid());
        }

        let integer = U256::from_dec_str(integer).map_err(|_| invalid())?;
        let padded = format!("{:0<width$}", fraction, width = PRECISION);
        let fraction = U256::from_dec_str(&padded).map_err(|_| invalid())?;

        integer
            .checked_mul(precision_multiplier())
            .and_then(|v| v.checked_add(fraction))
            .map(Dec)
            .ok_or(ArithmeticError::Overflow)
    }
}

impl Serialize for Dec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Dec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
