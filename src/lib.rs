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

//! # Moneyjar
//!
//! This library keeps track of shared debts inside a group. A user records
//! that they paid for others; the amount is normalized into one base
//! currency, split between the participants and posted as signed balance
//! deltas on the pair account of every two users involved.
//!
//! ## Core Components
//!
//! - [`Ledger`]: Registers users, posts debts, answers balance and history queries
//! - [`Store`]: Persistence contract; [`MemoryStore`] keeps everything behind one lock
//! - [`CurrencyNormalizer`]: Converts amounts into base minor units through a [`RateSource`]
//! - [`merge_duplicates`]: Builds one [`CanonicalBalance`] per user pair for display
//! - [`LedgerError`]: Error types for ledger operations
//!
//! ## Example
//!
//! ```
//! use moneyjar_rs::{Config, Currency, FixedRates, Ledger, MemoryStore, TargetSelector, UserId};
//! use rust_decimal_macros::dec;
//!
//! let config = Config::default();
//! let ledger = Ledger::new(MemoryStore::new(), FixedRates::new(Currency::Usd), &config);
//!
//! ledger.register(UserId(1), "alice").unwrap();
//! ledger.register(UserId(2), "bob").unwrap();
//!
//! // alice paid 30 dollars for bob
//! let balances = ledger
//!     .post_debt(UserId(1), &TargetSelector::parse("@bob"), dec!(30), Currency::Usd, "dinner")
//!     .unwrap();
//!
//! assert_eq!(balances[0].position_of(UserId(1)).to_string(), "30.00");
//! ```
//!
//! ## Thread Safety
//!
//! Every store operation runs under one reader-writer lock with a bounded
//! wait, so a [`Ledger`] can be shared across threads behind an `Arc`.

pub mod account;
mod base;
pub mod config;
pub mod currency;
mod engine;
pub mod error;
mod exchange_api;
pub mod message;
mod money;
pub mod store;
mod transaction;
pub mod view;

pub use account::{CanonicalBalance, CounterpartyAccount, PairRow, User};
pub use base::{AccountId, PairKey, UserId};
pub use config::{Config, RatesConfig};
pub use currency::{Currency, CurrencyNormalizer, FixedRates, RateSource};
pub use engine::{Ledger, split_legs};
pub use error::{ConfigError, LedgerError};
pub use exchange_api::ExchangeRateApi;
pub use message::Message;
pub use money::Money;
pub use store::{MemoryStore, Store};
pub use transaction::{DebtLeg, LogEntry, TargetSelector};
pub use view::{format_balance_line, merge_duplicates};
