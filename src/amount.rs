use ethers::{
    types::{U256, U512},
    utils::format_units,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{KpiError, Result};
use crate::types::Token;

/// Token amount in the smallest unit of its currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub currency: Token,
    pub raw: U256,
}

impl Amount {
    pub fn new(currency: Token, raw: U256) -> Self {
        Self { currency, raw }
    }

    pub fn zero(currency: Token) -> Self {
        Self::new(currency, U256::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }

    pub fn checked_add(&self, other: &Amount) -> Result<Amount> {
        self.ensure_same_currency(other)?;
        let raw = self.raw.checked_add(other.raw).ok_or(KpiError::Overflow)?;
        Ok(Self::new(self.currency.clone(), raw))
    }

    /// `None` when `other` is larger than `self`
    pub fn checked_sub(&self, other: &Amount) -> Result<Option<Amount>> {
        self.ensure_same_currency(other)?;
        Ok(self
            .raw
            .checked_sub(other.raw)
            .map(|raw| Self::new(self.currency.clone(), raw)))
    }

    /// `self * numerator / denominator`, truncated
    pub fn mul_div(&self, numerator: U256, denominator: U256) -> Result<Amount> {
        let raw = mul_div(self.raw, numerator, denominator)?;
        Ok(Self::new(self.currency.clone(), raw))
    }

    /// Decimal representation using the currency's decimals
    pub fn format(&self) -> Result<String> {
        format_units(self.raw, u32::from(self.currency.decimals))
            .map_err(|e| KpiError::InconsistentInput(format!("cannot format amount: {}", e)))
    }

    fn ensure_same_currency(&self, other: &Amount) -> Result<()> {
        if self.currency != other.currency {
            return Err(KpiError::InconsistentInput(format!(
                "currency mismatch: {} vs {}",
                self.currency.symbol, other.currency.symbol
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format() {
            Ok(value) => write!(f, "{} {}", value, self.currency.symbol),
            Err(_) => write!(f, "{} (raw) {}", self.raw, self.currency.symbol),
        }
    }
}

/// `a * b / denominator` with a 512 bit intermediate product
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256> {
    if denominator.is_zero() {
        return Err(KpiError::DivisionByZero);
    }
    let product: U512 = a.full_mul(b);
    U256::try_from(product / U512::from(denominator)).map_err(|_| KpiError::Overflow)
}
