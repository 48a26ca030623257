//! Fixed-point money (integer cents).
//!
//! `Money` is the single source of rounding truth: UI input arrives either as a
//! decimal string (`"25.00"`) or as a float that must be rounded with the
//! `round(value * 100) / 100` rule, and both paths end up here. Everything after
//! that is integer arithmetic, so sums of split lines are cent-exact.
//!
//! Wire encoding is a decimal string with exactly two fraction digits; storage
//! encoding is the raw cent count (`cents()`).

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use core::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Monetary amount with two decimal places, stored as signed cents.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Round a float to cents, half-up (`floor(value * 100 + 0.5)`).
    ///
    /// Matches the UI's `Math.round(value * 100) / 100`, including for negative
    /// halves (`-0.125` rounds to `-0.12`).
    pub fn round_to_cents(value: f64) -> DomainResult<Self> {
        if !value.is_finite() {
            return Err(DomainError::invalid_amount(format!(
                "amount must be finite (got {value})"
            )));
        }
        let scaled = (value * 100.0 + 0.5).floor();
        if scaled < i64::MIN as f64 || scaled >= i64::MAX as f64 {
            return Err(DomainError::invalid_amount(format!(
                "amount out of range (got {value})"
            )));
        }
        Ok(Money(scaled as i64))
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Checked addition that reports overflow as `InvalidAmount`.
    pub fn try_add(self, rhs: Money) -> DomainResult<Money> {
        self.checked_add(rhs)
            .ok_or_else(|| DomainError::invalid_amount("amount overflow"))
    }

    /// Checked subtraction that reports overflow as `InvalidAmount`.
    pub fn try_sub(self, rhs: Money) -> DomainResult<Money> {
        self.checked_sub(rhs)
            .ok_or_else(|| DomainError::invalid_amount("amount overflow"))
    }

    /// Sum that reports overflow as `InvalidAmount` instead of wrapping.
    ///
    /// Use this wherever the amounts come from user input; the `Sum` impl is
    /// for values already known to be in range.
    pub fn try_sum<I: IntoIterator<Item = Money>>(amounts: I) -> DomainResult<Money> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |total, amount| total.try_add(amount))
    }

    pub fn ensure_non_negative(self) -> DomainResult<Money> {
        if self.is_negative() {
            return Err(DomainError::invalid_amount(format!(
                "amount must not be negative (got {self})"
            )));
        }
        Ok(self)
    }

    pub fn ensure_positive(self) -> DomainResult<Money> {
        if !self.is_positive() {
            return Err(DomainError::invalid_amount(format!(
                "amount must be greater than zero (got {self})"
            )));
        }
        Ok(self)
    }

    /// Split this amount proportionally to `weights`.
    ///
    /// Every share is a whole number of cents. Whatever the integer division
    /// leaves over goes to the first share, so the shares always sum back to
    /// `self` exactly.
    pub fn allocate(self, weights: &[u64]) -> DomainResult<Vec<Money>> {
        self.ensure_non_negative()?;
        if weights.is_empty() {
            return Err(DomainError::validation("allocation needs at least one weight"));
        }
        let total_weight: u128 = weights.iter().map(|w| *w as u128).sum();
        if total_weight == 0 {
            return Err(DomainError::validation("allocation weights must not all be zero"));
        }

        let amount = self.0 as u128;
        let mut shares: Vec<Money> = weights
            .iter()
            .map(|w| Money((amount * (*w as u128) / total_weight) as i64))
            .collect();

        let allocated: i64 = shares.iter().map(|m| m.0).sum();
        shares[0].0 += self.0 - allocated;
        Ok(shares)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    /// Parse a decimal string with at most two fraction digits (`"25"`, `"25.5"`,
    /// `"-0.07"`). Anything finer than a cent is rejected rather than rounded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let invalid = || DomainError::invalid_amount(format!("'{s}' is not a decimal amount"));

        let (negative, digits) = match raw.as_bytes().first() {
            Some(b'-') => (true, &raw[1..]),
            Some(b'+') => (false, &raw[1..]),
            _ => (false, raw),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > 2 {
            return Err(DomainError::invalid_amount(format!(
                "'{s}' has more than two decimal places"
            )));
        }

        let whole_cents = if whole.is_empty() {
            0i64
        } else {
            whole
                .parse::<i64>()
                .ok()
                .and_then(|w| w.checked_mul(100))
                .ok_or_else(invalid)?
        };
        let frac_cents = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse::<i64>().map_err(|_| invalid())?,
        };

        let cents = whole_cents.checked_add(frac_cents).ok_or_else(invalid)?;
        Ok(Money(if negative { -cents } else { cents }))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MoneyVisitor;

        impl Visitor<'_> for MoneyVisitor {
            type Value = Money;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal string with at most two fraction digits")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(MoneyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn displays_two_fraction_digits() {
        assert_eq!(Money::from_cents(2500).to_string(), "25.00");
        assert_eq!(Money::from_cents(7).to_string(), "0.07");
        assert_eq!(Money::from_cents(-1230).to_string(), "-12.30");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn parses_decimal_strings() {
        assert_eq!("25".parse::<Money>().unwrap(), Money::from_cents(2500));
        assert_eq!("25.5".parse::<Money>().unwrap(), Money::from_cents(2550));
        assert_eq!(" 0.07 ".parse::<Money>().unwrap(), Money::from_cents(7));
        assert_eq!("-4.10".parse::<Money>().unwrap(), Money::from_cents(-410));
        assert_eq!(".5".parse::<Money>().unwrap(), Money::from_cents(50));
    }

    #[test]
    fn rejects_sub_cent_and_garbage() {
        for input in ["1.005", "abc", "", "-", ".", "1.2.3", "1e3", "--1"] {
            let err = input.parse::<Money>().unwrap_err();
            assert!(matches!(err, DomainError::InvalidAmount(_)), "{input}: {err:?}");
        }
    }

    #[test]
    fn round_to_cents_is_half_up() {
        assert_eq!(Money::round_to_cents(10.125).unwrap(), Money::from_cents(1013));
        assert_eq!(Money::round_to_cents(0.1 + 0.2).unwrap(), Money::from_cents(30));
        assert_eq!(Money::round_to_cents(-0.125).unwrap(), Money::from_cents(-12));
        assert_eq!(Money::round_to_cents(-1.015).unwrap(), Money::from_cents(-101));
    }

    #[test]
    fn round_to_cents_rejects_non_finite() {
        assert!(Money::round_to_cents(f64::NAN).is_err());
        assert!(Money::round_to_cents(f64::INFINITY).is_err());
        assert!(Money::round_to_cents(1e300).is_err());
    }

    #[test]
    fn ensure_positive_rejects_zero_and_negative() {
        assert!(Money::ZERO.ensure_positive().is_err());
        assert!(Money::from_cents(-1).ensure_positive().is_err());
        assert!(Money::from_cents(-1).ensure_non_negative().is_err());
        assert!(Money::ZERO.ensure_non_negative().is_ok());
    }

    #[test]
    fn try_sum_reports_overflow() {
        let near_max = Money::from_cents(i64::MAX - 1);
        let err = Money::try_sum([near_max, Money::from_cents(2)]).unwrap_err();
        assert!(matches!(err, DomainError::InvalidAmount(_)));

        let total = Money::try_sum([Money::from_cents(150), Money::from_cents(-50)]).unwrap();
        assert_eq!(total, Money::from_cents(100));
        assert_eq!(Money::try_sum(Vec::new()).unwrap(), Money::ZERO);
    }

    #[test]
    fn allocate_assigns_remainder_to_first_share() {
        let shares = Money::from_cents(1000).allocate(&[1, 1, 1]).unwrap();
        assert_eq!(
            shares,
            vec![Money::from_cents(334), Money::from_cents(333), Money::from_cents(333)]
        );
    }

    #[test]
    fn serde_uses_decimal_strings() {
        let json = serde_json::to_string(&Money::from_cents(1999)).unwrap();
        assert_eq!(json, "\"19.99\"");
        let back: Money = serde_json::from_str("\"-3.5\"").unwrap();
        assert_eq!(back, Money::from_cents(-350));
        assert!(serde_json::from_str::<Money>("1999").is_err());
    }

    proptest! {
        #[test]
        fn display_then_parse_is_identity(cents in -10_000_000_000i64..10_000_000_000i64) {
            let m = Money::from_cents(cents);
            prop_assert_eq!(m.to_string().parse::<Money>().unwrap(), m);
        }

        #[test]
        fn allocation_shares_sum_to_total(
            cents in 0i64..100_000_000,
            weights in prop::collection::vec(1u64..1_000, 1..8),
        ) {
            let total = Money::from_cents(cents);
            let shares = total.allocate(&weights).unwrap();
            prop_assert_eq!(shares.len(), weights.len());
            prop_assert_eq!(shares.iter().sum::<Money>(), total);
            prop_assert!(shares.iter().all(|s| !s.is_negative()));
        }
    }
}
