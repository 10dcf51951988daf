//! # Money Module
//!
//! Provides the `Money` type used for book prices.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  A form field "12.99" parsed as a float and multiplied by 3:            │
//! │    12.99 * 3 = 38.97000000000001  ❌ WRONG!                             │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    "12.99" → 1299 cents → 1299 * 3 = 3897 cents = $38.97               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Arithmetic is checked: a total that doesn't fit in `i64` cents comes back
//! as `None` instead of wrapping or panicking.
//!
//! ## Usage
//! ```rust
//! use bookstock_core::money::Money;
//!
//! let price: Money = "12.99".parse().unwrap();
//! assert_eq!(price.cents(), 1299);
//!
//! let line_total = price.checked_multiply_quantity(3).unwrap();
//! assert_eq!(line_total.to_string(), "$38.97");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Serializes as a bare integer, so a book's `price` field is `1299` on the
/// wire and in the `books.price` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use bookstock_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the dollar portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a quantity, `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use bookstock_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(1499);
    /// assert_eq!(unit_price.checked_multiply_quantity(2), Some(Money::from_cents(2998)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_multiply_quantity(2), None);
    /// ```
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Parses a decimal price as typed into the inventory form.
///
/// Accepts an optional leading `$`, whole dollars (`"12"`), or up to two
/// decimal places (`"12.5"`, `"12.99"`). Negative amounts are rejected since
/// prices are never negative.
///
/// ## Example
/// ```rust
/// use bookstock_core::money::Money;
///
/// assert_eq!("$7.5".parse::<Money>().unwrap().cents(), 750);
/// assert!("-1.00".parse::<Money>().is_err());
/// assert!("1.999".parse::<Money>().is_err());
/// ```
impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "price".to_string(),
            reason: reason.to_string(),
        };

        let s = s.trim();
        let s = s.strip_prefix('$').unwrap_or(s);

        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "price".to_string(),
            });
        }

        let (whole, frac) = match s.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (s, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(invalid("must contain digits"));
        }

        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("must be a non-negative decimal number"));
        }

        if frac.len() > 2 {
            return Err(invalid("at most two decimal places"));
        }

        let dollars: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("amount too large"))?
        };

        // "12.5" means 50 cents, not 5
        let cents: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid("invalid cents"))? * 10,
            _ => frac.parse().map_err(|_| invalid("invalid cents"))?,
        };

        dollars
            .checked_mul(100)
            .and_then(|c| c.checked_add(cents))
            .map(Money)
            .ok_or_else(|| invalid("amount too large"))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money as `$12.99`.
///
/// ## Note
/// For logs and receipts. The frontend formats prices for its own locale.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
