use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::decimal::Dec;
use crate::utils::errors::ArithmeticError;

fn validate_denom(denom: &str) -> Result<(), ArithmeticError> {
    let valid = !denom.is_empty()
        && denom.len() <= 128
        && denom.starts_with(|c: char| c.is_ascii_alphabetic())
        && denom
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(ArithmeticError::InvalidDenom(denom.to_string()))
    }
}

/// Multi-denomination integer amount. Zero entries are never stored, and
/// denoms iterate in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coins(BTreeMap<String, u128>);

impl Coins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(denom: &str, amount: u128) -> Result<Self, ArithmeticError> {
        validate_denom(denom)?;
        let mut coins = Coins::new();
        if amount > 0 {
            coins.0.insert(denom.to_string(), amount);
        }
        Ok(coins)
    }

    pub fn amount_of(&self, denom: &str) -> u128 {
        self.0.get(denom).copied().unwrap_or(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u128)> {
        self.0.iter().map(|(denom, amount)| (denom.as_str(), *amount))
    }

    pub fn denoms(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn checked_add(&self, other: &Coins) -> Result<Coins, ArithmeticError> {
        let mut sum = self.clone();
        for (denom, amount) in other.iter() {
            sum.add_amount(denom, amount)?;
        }
        Ok(sum)
    }

    /// Per-denom sum clamped at `u128::MAX`, with a flag telling whether any
    /// denom was clamped. Only for read paths that cannot report errors.
    pub fn saturating_add(&self, other: &Coins) -> (Coins, bool) {
        let mut sum = self.clone();
        let mut clamped = false;
        for (denom, amount) in other.iter() {
            let current = sum.amount_of(denom);
            let next = current.checked_add(amount).unwrap_or_else(|| {
                clamped = true;
                u128::MAX
            });
            sum.set_amount(denom, next);
        }
        (sum, clamped)
    }

    /// Fails with `NegativeAmount` if any denom would go below zero.
    pub fn checked_sub(&self, other: &Coins) -> Result<Coins, ArithmeticError> {
        let mut diff = self.clone();
        for (denom, amount) in other.iter() {
            let current = diff.amount_of(denom);
            let next = current
                .checked_sub(amount)
                .ok_or(ArithmeticError::NegativeAmount)?;
            diff.set_amount(denom, next);
        }
        Ok(diff)
    }

    pub fn add_amount(&mut self, denom: &str, amount: u128) -> Result<(), ArithmeticError> {
        validate_denom(denom)?;
        let next = self
            .amount_of(denom)
            .checked_add(amount)
            .ok_or(ArithmeticError::Overflow)?;
        self.set_amount(denom, next);
        Ok(())
    }

    /// Checks deserialized values: well-formed denoms, no zero entries.
    pub fn validate(&self) -> Result<(), ArithmeticError> {
        for (denom, amount) in self.iter() {
            validate_denom(denom)?;
            if amount == 0 {
                return Err(ArithmeticError::InvalidDecimal(format!(
                    "zero amount for {}",
                    denom
                )));
            }
        }
        Ok(())
    }

    fn set_amount(&mut self, denom: &str, amount: u128) {
        if amount == 0 {
            self.0.remove(denom);
        } else {
            self.0.insert(denom.to_string(), amount);
        }
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (denom, amount) in self.iter() {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}{}", amount, denom)?;
            first = false;
        }
        Ok(())
    }
}

/// Multi-denomination fixed-point amount. Only exists transiently during
/// allocation; records persist `Coins`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecCoins(BTreeMap<String, Dec>);

impl DecCoins {
    pub fn from_coins(coins: &Coins) -> Self {
        DecCoins(
            coins
                .iter()
                .map(|(denom, amount)| (denom.to_string(), Dec::from_int(amount)))
                .collect(),
        )
    }

    pub fn amount_of(&self, denom: &str) -> Dec {
        self.0.get(denom).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Dec)> {
        self.0.iter().map(|(denom, amount)| (denom.as_str(), amount))
    }

    pub fn quo_int_truncate(&self, n: u128) -> Result<DecCoins, ArithmeticError> {
        self.map(|amount| amount.quo_int_truncate(n))
    }

    pub fn quo_dec_truncate(&self, divisor: &Dec) -> Result<DecCoins, ArithmeticError> {
        self.map(|amount| amount.quo_truncate(divisor))
    }

    pub fn mul_dec_truncate(&self, ratio: &Dec) -> Result<DecCoins, ArithmeticError> {
        self.map(|amount| amount.mul_truncate(ratio))
    }

    /// Integer coins plus the fractional change that was cut off.
    pub fn truncate(&self) -> Result<(Coins, DecCoins), ArithmeticError> {
        let mut coins = Coins::new();
        let mut change = DecCoins::default();
        for (denom, amount) in self.iter() {
            let (integer, rest) = amount.truncate()?;
            coins.add_amount(denom, integer)?;
            if !rest.is_zero() {
                change.0.insert(denom.to_string(), rest);
            }
        }
        Ok((coins, change))
    }

    fn map<F>(&self, f: F) -> Result<DecCoins, ArithmeticError>
    where
        F: Fn(&Dec) -> Result<Dec, ArithmeticError>,
    {
        let mut out = BTreeMap::new();
        for (denom, amount) in &self.0 {
            let value = f(amount)?;
            if !value.is_zero() {
                out.insert(denom.clone(), value);
            }
        }
        Ok(DecCoins(out))
    }
}
