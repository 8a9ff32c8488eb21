//! # Money Module
//!
//! Provides the `Money` type used for product prices.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Range filters break on that: a product priced 10.00 stored as         │
//! │  9.99999999 falls out of "price between 10 and 50".                    │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Minor Units                                      │
//! │    Prices are stored, compared and summed as whole cents.              │
//! │    SQLite keeps them in an INTEGER column, so SQL comparisons and      │
//! │    in-memory comparisons agree exactly.                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use orderdesk_core::money::Money;
//!
//! let price = Money::from_cents(1099); // 10.99
//! let total = price + Money::from_major(5); // 15.99
//! assert_eq!(total.to_string(), "15.99");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: arithmetic never panics on intermediate negatives;
///   validation rejects negative prices before they reach a store
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Transparent encoding**: serializes and persists as the bare integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use orderdesk_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // Represents 10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole currency units.
    ///
    /// ## Example
    /// ```rust
    /// use orderdesk_core::money::Money;
    ///
    /// assert_eq!(Money::from_major(25).cents(), 2500);
    /// ```
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * 100)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ## Note
    /// For negative amounts, only the major unit should be negative.
    /// `from_major_minor(-5, 50)` = -5.50, not -4.50
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Arithmetic mean of a sequence of amounts, rounded to the nearest cent.
    ///
    /// Halves round away from zero. Returns `None` for an empty sequence
    /// rather than inventing a zero average.
    ///
    /// ## Example
    /// ```rust
    /// use orderdesk_core::money::Money;
    ///
    /// let prices = [Money::from_cents(100), Money::from_cents(101)];
    /// assert_eq!(Money::average(prices), Some(Money::from_cents(101))); // 100.5 → 101
    /// assert_eq!(Money::average(Vec::<Money>::new()), None);
    /// ```
    pub fn average<I>(amounts: I) -> Option<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        // i128 so that summing many large prices cannot overflow
        let (total, count) = amounts
            .into_iter()
            .fold((0_i128, 0_i128), |(total, count), m| (total + m.0 as i128, count + 1));

        if count == 0 {
            return None;
        }

        let rounded = if total >= 0 {
            (total * 2 + count) / (count * 2)
        } else {
            (total * 2 - count) / (count * 2)
        };

        Some(Money(rounded as i64))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering, e.g. `10.99` or `-5.50`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.cents_part())
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
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

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_sum() {
        let total: Money = [Money::from_major(5), Money::from_major(25), Money::from_cents(1)]
            .into_iter()
            .sum();
        assert_eq!(total.cents(), 3001);
    }

    #[test]
    fn test_average_rounds_half_away_from_zero() {
        let avg = Money::average([Money::from_cents(1), Money::from_cents(2)]);
        assert_eq!(avg, Some(Money::from_cents(2)));

        let avg = Money::average([Money::from_cents(-1), Money::from_cents(-2)]);
        assert_eq!(avg, Some(Money::from_cents(-2)));

        let avg = Money::average([Money::from_cents(10), Money::from_cents(10), Money::from_cents(11)]);
        assert_eq!(avg, Some(Money::from_cents(10)));
    }

    #[test]
    fn test_average_of_nothing_is_none() {
        assert_eq!(Money::average(std::iter::empty()), None);
    }

    #[test]
    fn test_serializes_as_bare_integer() {
        let json = serde_json::to_string(&Money::from_cents(2500)).unwrap();
        assert_eq!(json, "2500");
    }
}
