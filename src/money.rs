// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Fixed-point money amounts.
//!
//! Balances are stored as a signed count of minor units (cents) of the base
//! currency, so repeated postings never accumulate floating-point drift.
//!
//! # Example
//!
//! ```
//! use moneyjar_rs::{Currency, Money};
//! use rust_decimal_macros::dec;
//!
//! let amount = Money::from_decimal(dec!(12.345), Currency::Usd).unwrap();
//! assert_eq!(amount, Money::from_minor(1235));
//! assert_eq!(amount.to_string(), "12.35");
//! ```

use crate::currency::Currency;
use crate::error::LedgerError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Signed amount in minor units of the ledger's base currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);
    /// Largest representable amount.
    pub const MAX: Money = Money(i64::MAX);
    /// Smallest representable amount; the range is symmetric so negation never overflows.
    pub const MIN: Money = Money(-i64::MAX);

    /// Minor digits used when rendering a normalized amount.
    const DISPLAY_SCALE: u32 = 2;

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Converts a floating-point amount of `currency` into minor units.
    ///
    /// Rounds to the nearest minor unit, ties away from zero.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidAmount`] for NaN, infinities, or values that do
    /// not fit into an `i64` count of minor units.
    pub fn from_float(amount: f64, currency: Currency) -> Result<Self, LedgerError> {
        if !amount.is_finite() {
            return Err(LedgerError::InvalidAmount);
        }
        let amount = Decimal::try_from(amount).map_err(|_| LedgerError::InvalidAmount)?;
        Self::from_decimal(amount, currency)
    }

    /// Converts an exact decimal amount of `currency` into minor units.
    pub fn from_decimal(amount: Decimal, currency: Currency) -> Result<Self, LedgerError> {
        let scale = Decimal::from(10_i64.pow(currency.minor_digits()));
        amount
            .checked_mul(scale)
            .map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|rounded| rounded.to_i64())
            .and_then(Self::in_range)
            .ok_or(LedgerError::InvalidAmount)
    }

    /// Returns the amount in major units, e.g. `1250` minor units as `12.50`.
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, Self::DISPLAY_SCALE)
    }

    /// Divides the amount into `parts` equal shares, rounding half away from zero.
    ///
    /// Returns `None` when `parts` is zero.
    pub fn split(self, parts: u32) -> Option<Self> {
        if parts == 0 {
            return None;
        }
        let divisor = i64::from(parts);
        let quotient = self.0 / divisor;
        let remainder = self.0 % divisor;
        if 2 * remainder.abs() >= divisor {
            Some(Self(quotient + self.0.signum()))
        } else {
            Some(Self(quotient))
        }
    }

    fn in_range(minor: i64) -> Option<Self> {
        (minor != i64::MIN).then_some(Self(minor))
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).and_then(Self::in_range)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).and_then(Self::in_range)
    }

    fn saturating(minor: i128) -> Self {
        Self(minor.clamp(i128::from(Self::MIN.0), i128::from(Self::MAX.0)) as i64)
    }

    pub fn abs(self) -> Self {
        if self.is_negative() { -self } else { self }
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

// Operators saturate at `Money::MIN`/`Money::MAX`; use the checked variants
// where an overflow must be reported.
impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::saturating(i128::from(self.0) + i128::from(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::saturating(i128::from(self.0) - i128::from(rhs.0))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::saturating(-i128::from(self.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}
