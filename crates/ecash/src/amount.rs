//! Amounts and denomination math
//!
//! Amounts are unit-agnostic integers; the unit they are denominated in is
//! carried separately (see [`crate::proof::CurrencyUnit`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Amount Error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Amount overflow
    #[error("Amount overflow")]
    AmountOverflow,
    /// Amount cannot be fully decomposed into the given denominations
    #[error("Amount `{0}` cannot be represented by the keyset denominations")]
    NotRepresentable(Amount),
    /// Invalid amount
    #[error("Invalid amount: `{0}`")]
    InvalidAmount(String),
}

/// Amount can be any unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Amount zero
    pub const ZERO: Amount = Amount(0);

    /// Amount one
    pub const ONE: Amount = Amount(1);

    /// Greedily decompose the amount into keyset denominations.
    ///
    /// `denominations` must be sorted ascending (the order a keyset's key map
    /// iterates in). The largest denomination that still fits is consumed
    /// repeatedly. An amount the denominations cannot fully represent is an
    /// error; partial decomposition is never returned.
    pub fn split_into(&self, denominations: &[Amount]) -> Result<Vec<Amount>, Error> {
        let (parts, remainder) =
            denominations
                .iter()
                .rev()
                .fold((Vec::new(), self.0), |(mut acc, mut rem), denom| {
                    if denom.0 > 0 {
                        while rem >= denom.0 {
                            acc.push(*denom);
                            rem -= denom.0;
                        }
                    }
                    (acc, rem)
                });

        if remainder != 0 {
            return Err(Error::NotRepresentable(*self));
        }

        Ok(parts)
    }

    /// Checked addition. Returns None on overflow.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction. Returns None on underflow.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Checked multiplication. Returns None on overflow.
    pub fn checked_mul(self, other: Amount) -> Option<Amount> {
        self.0.checked_mul(other.0).map(Amount)
    }

    /// Sum amounts, checking for overflow
    pub fn try_sum<I>(iter: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = Self>,
    {
        iter.into_iter().try_fold(Amount::ZERO, |acc, x| {
            acc.checked_add(x).ok_or(Error::AmountOverflow)
        })
    }

    /// Convert to u64
    pub fn to_u64(self) -> u64 {
        self.0
    }
}

/// Number of blank outputs needed so a mint can return any change amount up
/// to `amount` without the change value being committed to in advance.
///
/// `max(ceil(log2(amount)), 1)`, and `0` for a zero amount.
pub fn blank_output_count(amount: Amount) -> u64 {
    if amount == Amount::ZERO {
        return 0;
    }
    ((amount.0 as f64).log2().ceil() as u64).max(1)
}

impl Default for Amount {
    fn default() -> Self {
        Amount::ZERO
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .parse::<u64>()
            .map_err(|_| Error::InvalidAmount(s.to_owned()))?;
        Ok(Amount(value))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Amount> for u64 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Self::Output {
        self.checked_add(rhs)
            .expect("Addition overflow: the sum of the amounts exceeds the maximum value")
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Self::Output {
        self.checked_sub(rhs)
            .expect("Subtraction underflow: cannot subtract a larger amount from a smaller amount")
    }
}

impl std::ops::SubAssign for Amount {
    fn sub_assign(&mut self, other: Self) {
        *self = *self - other;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_denominations() -> Vec<Amount> {
        (0..32).map(|x| Amount::from(2u64.pow(x))).collect()
    }

    #[test]
    fn test_split_into() {
        let denoms = binary_denominations();

        assert_eq!(Amount::from(1).split_into(&denoms).unwrap(), vec![Amount::from(1)]);
        assert_eq!(Amount::from(2).split_into(&denoms).unwrap(), vec![Amount::from(2)]);
        assert_eq!(
            Amount::from(3).split_into(&denoms).unwrap(),
            vec![Amount::from(2), Amount::from(1)]
        );
        let amounts: Vec<Amount> = [8, 2, 1].iter().map(|a| Amount::from(*a)).collect();
        assert_eq!(Amount::from(11).split_into(&denoms).unwrap(), amounts);
        let amounts: Vec<Amount> = [128, 64, 32, 16, 8, 4, 2, 1]
            .iter()
            .map(|a| Amount::from(*a))
            .collect();
        assert_eq!(Amount::from(255).split_into(&denoms).unwrap(), amounts);
    }

    #[test]
    fn test_split_into_sums_to_input() {
        let denoms = binary_denominations();

        for amount in [1u64, 7, 63, 64, 255, 1000, 1337, 987_654_321] {
            let amount = Amount::from(amount);
            let parts = amount.split_into(&denoms).unwrap();
            assert_eq!(Amount::try_sum(parts.iter().copied()).unwrap(), amount);
            for part in parts {
                assert!(denoms.contains(&part));
            }
        }
    }

    #[test]
    fn test_split_into_rejects_remainder() {
        // A keyset missing the 1-denomination cannot represent odd amounts
        let denoms: Vec<Amount> = (1..32).map(|x| Amount::from(2u64.pow(x))).collect();

        assert_eq!(
            Amount::from(5).split_into(&denoms),
            Err(Error::NotRepresentable(Amount::from(5)))
        );
        // Even amounts still decompose
        assert_eq!(
            Amount::from(6).split_into(&denoms).unwrap(),
            vec![Amount::from(4), Amount::from(2)]
        );
    }

    #[test]
    fn test_split_into_repeats_denominations() {
        // Non power-of-two keysets consume the same denomination repeatedly
        let denoms = vec![Amount::from(1), Amount::from(5)];

        assert_eq!(
            Amount::from(12).split_into(&denoms).unwrap(),
            vec![
                Amount::from(5),
                Amount::from(5),
                Amount::from(1),
                Amount::from(1)
            ]
        );
    }

    #[test]
    fn test_blank_output_count() {
        assert_eq!(blank_output_count(Amount::ZERO), 0);
        assert_eq!(blank_output_count(Amount::ONE), 1);
        assert_eq!(blank_output_count(Amount::from(2)), 1);
        assert_eq!(blank_output_count(Amount::from(1000)), 10);
    }

    #[test]
    fn test_try_sum() {
        let amounts = vec![Amount::from(10), Amount::from(20), Amount::from(30)];
        assert_eq!(Amount::try_sum(amounts).unwrap(), Amount::from(60));

        let empty: Vec<Amount> = vec![];
        assert_eq!(Amount::try_sum(empty).unwrap(), Amount::ZERO);

        let overflowing = vec![Amount::from(u64::MAX), Amount::ONE];
        assert!(Amount::try_sum(overflowing).is_err());
    }

    #[test]
    #[should_panic(expected = "Subtraction underflow")]
    fn test_sub_underflow_panics() {
        let _ = Amount::from(30) - Amount::from(100);
    }
}
