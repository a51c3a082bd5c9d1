//! Type-safe price representation in minor currency units.
//!
//! Prices travel as integers in the smallest unit of the currency (paise for
//! INR) so cart totals never accumulate floating point error. Conversion to
//! [`Decimal`] happens only for display.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An amount of money in minor currency units.
///
/// ```
/// use grocer_core::Price;
///
/// let unit = Price::from_minor(8000);
/// assert_eq!(unit.times(2), Price::from_minor(16000));
/// assert_eq!(unit.to_string(), "₹80.00");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// Zero in any currency.
    pub const ZERO: Self = Self(0);

    /// Create a price from minor units (e.g., paise).
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Amount in minor units.
    #[must_use]
    pub const fn minor_units(&self) -> i64 {
        self.0
    }

    /// Line total for `quantity` units at this price.
    ///
    /// Saturates instead of overflowing.
    #[must_use]
    pub const fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(quantity as i64))
    }

    /// Amount in major units (e.g., rupees) as a decimal.
    #[must_use]
    pub fn to_decimal(&self, currency: CurrencyCode) -> Decimal {
        Decimal::new(self.0, currency.minor_digits())
    }

    /// Format for display in the given currency (e.g., "₹80.00").
    #[must_use]
    pub fn display(&self, currency: CurrencyCode) -> String {
        let digits = currency.minor_digits() as usize;
        format!(
            "{}{:.digits$}",
            currency.symbol(),
            self.to_decimal(currency)
        )
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display(CurrencyCode::default()))
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Price {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

/// ISO 4217 currency codes the storefront can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// Display symbol.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// Number of minor-unit digits.
    #[must_use]
    pub const fn minor_digits(&self) -> u32 {
        2
    }
}
