use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Money as an exact count of minor currency units (kobo, cents).
///
/// All persisted amounts are whole minor units; `Decimal` is only used for
/// intermediate arithmetic, and every result is rounded back to a whole
/// unit before it is stored.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// create from a minor-unit count
    pub const fn from_minor(units: i64) -> Self {
        Money(units)
    }

    /// minor-unit count
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// exact decimal view of the minor-unit count
    pub fn as_decimal(&self) -> Decimal {
        Decimal::from(self.0)
    }

    /// round a decimal minor-unit amount to a whole unit, midpoint away from zero
    pub fn from_decimal_round(d: Decimal) -> Self {
        let rounded = d.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        // saturates on amounts beyond the i64 range
        Money(rounded.to_i64().unwrap_or(i64::MAX))
    }

    /// percentage of this amount (e.g., 3% of a principal), rounded to a minor unit
    pub fn percentage(&self, percent: Decimal) -> Self {
        Money::from_decimal_round(self.as_decimal() * percent / Decimal::ONE_HUNDRED)
    }

    /// check if zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// check if strictly positive
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// check if negative
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// minimum of two values
    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    /// maximum of two values
    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        self.0 -= other.0;
    }
}

/// interest or penalty rate held in fractional form (0.05 = 5%)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);

    /// create from the percent form the catalog stores (e.g., 10 for 10%)
    pub fn from_percent(percent: Decimal) -> Self {
        Rate(percent / Decimal::ONE_HUNDRED)
    }

    /// get as a fraction (0.05 for 5%)
    pub fn as_fraction(&self) -> Decimal {
        self.0
    }

    /// get as a percentage
    pub fn as_percent(&self) -> Decimal {
        self.0 * Decimal::ONE_HUNDRED
    }

    /// fractional rate per period for the given payment frequency
    pub fn periodic(&self, periods_per_year: u32) -> Decimal {
        self.0 / Decimal::from(periods_per_year)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rounding_midpoint_away_from_zero() {
        assert_eq!(Money::from_decimal_round(dec!(1346.5)), Money::from_minor(1347));
        assert_eq!(Money::from_decimal_round(dec!(679.94)), Money::from_minor(680));
        assert_eq!(Money::from_decimal_round(dec!(679.4)), Money::from_minor(679));
    }

    #[test]
    fn test_percentage_of_principal() {
        let principal = Money::from_minor(120_000);
        assert_eq!(principal.percentage(dec!(3)), Money::from_minor(3_600));
        assert_eq!(principal.percentage(dec!(0.5)), Money::from_minor(600));
    }

    #[test]
    fn test_periodic_rate() {
        let rate = Rate::from_percent(dec!(24));
        assert_eq!(rate.periodic(12), dec!(0.02));
        assert_eq!(rate.as_percent(), dec!(24));
    }

    #[test]
    fn test_money_arithmetic_is_exact() {
        let mut total = Money::ZERO;
        for _ in 0..3 {
            total += Money::from_minor(33_333);
        }
        assert_eq!(total, Money::from_minor(99_999));
        total -= Money::from_minor(99_999);
        assert!(total.is_zero());
    }
}
