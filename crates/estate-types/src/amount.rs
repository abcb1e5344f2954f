use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Monetary value in minor currency units.
///
/// Amounts are unsigned, so a balance can never be represented as negative;
/// every subtraction goes through [`Amount::checked_sub`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub const fn new(minor_units: u64) -> Self {
        Self(minor_units)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Self)
    }

    /// `None` when `other` exceeds `self`.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Sum an iterator of amounts, `None` on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Amount>>(amounts: I) -> Option<Amount> {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, a| acc.checked_add(a))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| TypeError::InvalidAmount(s.to_string()))
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_amounts() {
        assert_eq!("100".parse::<Amount>().unwrap(), Amount::new(100));
        assert_eq!(" 7 ".parse::<Amount>().unwrap(), Amount::new(7));
        assert!("-5".parse::<Amount>().is_err());
        assert!("1.5".parse::<Amount>().is_err());
        assert!("".parse::<Amount>().is_err());
    }

    #[test]
    fn subtraction_cannot_go_negative() {
        assert_eq!(Amount::new(5).checked_sub(Amount::new(6)), None);
        assert_eq!(
            Amount::new(6).checked_sub(Amount::new(6)),
            Some(Amount::ZERO)
        );
    }

    #[test]
    fn sum_detects_overflow() {
        assert_eq!(
            Amount::checked_sum([Amount::new(60), Amount::new(50)]),
            Some(Amount::new(110))
        );
        assert_eq!(Amount::checked_sum([Amount::new(u64::MAX), Amount::new(1)]), None);
        assert_eq!(Amount::checked_sum(std::iter::empty()), Some(Amount::ZERO));
    }

    #[test]
    fn serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&Amount::new(42)).unwrap(), "42");
    }

    proptest! {
        #[test]
        fn add_then_sub_restores(a in 0u64..u64::MAX / 2, b in 0u64..u64::MAX / 2) {
            let sum = Amount::new(a).checked_add(Amount::new(b)).unwrap();
            prop_assert_eq!(sum.checked_sub(Amount::new(b)), Some(Amount::new(a)));
        }
    }
}
