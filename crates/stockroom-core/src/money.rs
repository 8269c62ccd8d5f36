//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Fixed-Point Decimal?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In binary floating point:                                              │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: rust_decimal fixed-point values                          │
//! │    "0.1" + "0.2" = "0.3" exactly, and every money column at rest is    │
//! │    a decimal string, so the database round-trips losslessly too        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding Rules
//! Intermediate arithmetic is carried out at full decimal precision.
//! Rounding to 2 decimal places (half away from zero, the retail convention)
//! happens ONLY at the storage/display boundary, via [`Money::rounded`] /
//! [`Money::storage_string`]. Never round mid-calculation.

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Decimal places kept at the storage/display boundary.
const STORAGE_SCALE: u32 = 2;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount backed by a fixed-point decimal.
///
/// ## Design Decisions
/// - **Signed**: refunds and finance debits are negative amounts
/// - **Single field tuple struct**: zero-cost wrapper over `Decimal`
/// - **Serde transparent**: serializes as a decimal string (`"10.50"`),
///   matching the at-rest representation in the database
///
/// Every monetary value in the system flows through this type: catalog
/// prices, invoice/order totals, payments, refunds, commissions and the
/// finance breakdown.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Wraps a raw decimal as money.
    #[inline]
    pub const fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Creates a money value from whole currency units.
    ///
    /// ## Example
    /// ```rust
    /// use stockroom_core::money::Money;
    ///
    /// let price = Money::from_major(100); // 100.00
    /// assert_eq!(price.storage_string(), "100.00");
    /// ```
    #[inline]
    pub fn from_major(units: i64) -> Self {
        Money(Decimal::from(units))
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// Returns the underlying decimal (full precision, unrounded).
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Multiplies by a unit quantity (line total = unit price × qty).
    #[inline]
    pub fn times(&self, qty: i64) -> Self {
        Money(self.0 * Decimal::from(qty))
    }

    /// Takes a basis-point share of this amount (commission math).
    ///
    /// 100 bps = 1%. Full precision; round at the boundary.
    ///
    /// ## Example
    /// ```rust
    /// use stockroom_core::money::Money;
    ///
    /// let profit: Money = "120".parse().unwrap();
    /// let commission = profit.basis_points(250); // 2.5%
    /// assert_eq!(commission.storage_string(), "3.00");
    /// ```
    pub fn basis_points(&self, bps: u32) -> Self {
        Money(self.0 * Decimal::from(bps) / Decimal::from(10_000))
    }

    /// Rounds to 2 decimal places, half away from zero.
    ///
    /// This is the ONLY rounding point in the system; call it when an amount
    /// crosses the storage or display boundary.
    pub fn rounded(&self) -> Self {
        Money(
            self.0
                .round_dp_with_strategy(STORAGE_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// The at-rest representation: rounded, fixed 2-decimal string.
    ///
    /// ## Example
    /// ```rust
    /// use stockroom_core::money::Money;
    ///
    /// let m: Money = "10.5".parse().unwrap();
    /// assert_eq!(m.storage_string(), "10.50");
    /// ```
    pub fn storage_string(&self) -> String {
        let mut rounded = self.rounded().0;
        rounded.rescale(STORAGE_SCALE);
        rounded.to_string()
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows the full-precision amount; use [`Money::storage_string`]
/// for the fixed 2-decimal boundary form.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Money(Decimal::from_str(s)?))
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// sqlx Integration (feature-gated)
// =============================================================================
// Money columns are TEXT decimal strings. Encoding always goes through the
// storage boundary (rounded, 2 decimals); decoding accepts any valid decimal.

#[cfg(feature = "sqlx")]
mod db {
    use std::borrow::Cow;
    use std::str::FromStr;

    use sqlx::encode::IsNull;
    use sqlx::error::BoxDynError;
    use sqlx::sqlite::{Sqlite, SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};

    use super::Money;

    impl sqlx::Type<Sqlite> for Money {
        fn type_info() -> SqliteTypeInfo {
            <&str as sqlx::Type<Sqlite>>::type_info()
        }

        fn compatible(ty: &SqliteTypeInfo) -> bool {
            <&str as sqlx::Type<Sqlite>>::compatible(ty)
        }
    }

    impl<'q> sqlx::Encode<'q, Sqlite> for Money {
        fn encode_by_ref(
            &self,
            buf: &mut Vec<SqliteArgumentValue<'q>>,
        ) -> Result<IsNull, BoxDynError> {
            buf.push(SqliteArgumentValue::Text(Cow::Owned(self.storage_string())));
            Ok(IsNull::No)
        }
    }

    impl<'r> sqlx::Decode<'r, Sqlite> for Money {
        fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
            let text = <&str as sqlx::Decode<Sqlite>>::decode(value)?;
            Ok(Money::from_str(text)?)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    #[test]
    fn decimal_addition_is_exact() {
        // The canonical float failure case
        let sum = money("0.1") + money("0.2");
        assert_eq!(sum, money("0.3"));
    }

    #[test]
    fn times_quantity() {
        let unit = money("100");
        assert_eq!(unit.times(3), money("300"));
        assert_eq!(money("2.99").times(3), money("8.97"));
    }

    #[test]
    fn basis_points_share() {
        // 120 profit at 2.5% commission = 3
        assert_eq!(money("120").basis_points(250).rounded(), money("3"));
        // zero rate yields zero
        assert!(money("120").basis_points(0).is_zero());
    }

    #[test]
    fn rounding_only_at_boundary() {
        // Intermediate value keeps full precision
        let third = money("10").basis_points(3333); // 3.333
        assert_eq!(third.amount().to_string(), "3.3330");
        // Boundary rounds half away from zero
        assert_eq!(money("2.345").storage_string(), "2.35");
        assert_eq!(money("-2.345").storage_string(), "-2.35");
        assert_eq!(money("2.344").storage_string(), "2.34");
    }

    #[test]
    fn storage_string_is_fixed_scale() {
        assert_eq!(money("10.5").storage_string(), "10.50");
        assert_eq!(money("7").storage_string(), "7.00");
        assert_eq!(money("0").storage_string(), "0.00");
    }

    #[test]
    fn serde_round_trips_as_string() {
        let m = money("19.99");
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "\"19.99\"");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn signed_amounts() {
        let refund = -money("40");
        assert!(refund.is_negative());
        assert_eq!(money("100") + refund, money("60"));
    }

    #[test]
    fn sum_of_lines() {
        let total: Money = [money("100"), money("50.25"), money("0.75")]
            .into_iter()
            .sum();
        assert_eq!(total, money("151"));
    }
}
