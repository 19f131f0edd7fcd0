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

//! Currency codes and normalization into the ledger's base unit.
//!
//! The ledger never stores foreign amounts. Every posting goes through a
//! [`CurrencyNormalizer`], which asks a [`RateSource`] for the exchange rate
//! and returns [`Money`] in minor units of the base currency.

use crate::error::LedgerError;
use crate::money::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Currencies accepted in debt commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Usd,
    Rub,
    Gel,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Rub, Currency::Gel];

    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Rub => "RUB",
            Self::Gel => "GEL",
        }
    }

    /// Number of minor-unit digits (cents, kopecks, tetri).
    pub fn minor_digits(&self) -> u32 {
        match self {
            Self::Usd | Self::Rub | Self::Gel => 2,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = LedgerError;

    /// Accepts symbols, codes in either case and the spoken forms used in chat.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "$" | "usd" | "долларов" | "доллара" | "доллар" => Ok(Self::Usd),
            "₽" | "rub" | "рублей" | "рубля" | "рубль" => Ok(Self::Rub),
            "₾" | "gel" | "лари" | "лар" => Ok(Self::Gel),
            other => Err(LedgerError::ConversionError(format!("unknown currency '{other}'"))),
        }
    }
}

/// Source of exchange rates.
///
/// `rate(from, to)` returns how many units of `to` one unit of `from` buys.
/// Implementations that leave the process must bound every lookup with a
/// timeout and report expiry as [`LedgerError::ConversionError`].
pub trait RateSource: Send + Sync {
    fn rate(&self, from: Currency, to: Currency) -> Result<Decimal, LedgerError>;
}

impl<R: RateSource + ?Sized> RateSource for Box<R> {
    fn rate(&self, from: Currency, to: Currency) -> Result<Decimal, LedgerError> {
        (**self).rate(from, to)
    }
}

impl<R: RateSource + ?Sized> RateSource for &R {
    fn rate(&self, from: Currency, to: Currency) -> Result<Decimal, LedgerError> {
        (**self).rate(from, to)
    }
}

/// Static rate table, quoted against a single base currency.
#[derive(Debug, Clone)]
pub struct FixedRates {
    base: Currency,
    /// Value of one unit of the key currency in `base`.
    to_base: BTreeMap<Currency, Decimal>,
}

impl FixedRates {
    pub fn new(base: Currency) -> Self {
        Self {
            base,
            to_base: BTreeMap::new(),
        }
    }

    /// Sets the value of one unit of `currency` expressed in the base currency.
    pub fn with_rate(mut self, currency: Currency, rate: Decimal) -> Self {
        self.to_base.insert(currency, rate);
        self
    }

    fn value_in_base(&self, currency: Currency) -> Option<Decimal> {
        if currency == self.base {
            return Some(Decimal::ONE);
        }
        self.to_base.get(&currency).copied()
    }
}

impl RateSource for FixedRates {
    fn rate(&self, from: Currency, to: Currency) -> Result<Decimal, LedgerError> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        let missing = |c: Currency| LedgerError::ConversionError(format!("no rate for {c}"));
        let from_value = self.value_in_base(from).ok_or_else(|| missing(from))?;
        let to_value = self.value_in_base(to).ok_or_else(|| missing(to))?;
        from_value
            .checked_div(to_value)
            .ok_or_else(|| LedgerError::ConversionError(format!("cannot convert {from} to {to}")))
    }
}

/// Converts input amounts into minor units of the base currency.
#[derive(Debug, Clone)]
pub struct CurrencyNormalizer<R> {
    source: R,
    base: Currency,
}

impl<R: RateSource> CurrencyNormalizer<R> {
    pub fn new(source: R, base: Currency) -> Self {
        Self { source, base }
    }

    pub fn base(&self) -> Currency {
        self.base
    }

    /// Converts `amount` of `from` into base minor units.
    ///
    /// Amounts already in the base currency skip the rate lookup.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ConversionError`] - rate lookup failed.
    /// - [`LedgerError::InvalidAmount`] - the converted value overflows.
    pub fn convert(&self, amount: Decimal, from: Currency) -> Result<Money, LedgerError> {
        if from == self.base {
            return Money::from_decimal(amount, self.base);
        }
        let rate = self.source.rate(from, self.base)?;
        let converted = amount.checked_mul(rate).ok_or(LedgerError::InvalidAmount)?;
        debug!(%amount, %from, %rate, base = %self.base, "converted amount");
        Money::from_decimal(converted, self.base)
    }
}
