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

//! Users, pair accounts and canonical balances.
//!
//! One pair row exists per unordered user pair. The stored row is oriented
//! from the smaller user id to the larger one; a positive balance means the
//! `to_user` owes the `from_user`.
//!
//! ```text
//!  canonical:  from=low,  to=high   balance > 0 : high owes low
//!  flipped:    from=high, to=low    balance > 0 : low owes high
//! ```
//!
//! The store only writes canonical rows. Flipped rows come from the two-row
//! layout, where each direction accumulated separately; the balance view
//! merges them as `canonical - flipped`.
//!
//! # Example
//!
//! ```
//! use moneyjar_rs::{AccountId, Money, PairRow, UserId};
//!
//! let row = PairRow::canonical(AccountId(1), (UserId(1), "alice"), (UserId(2), "bob"), Money::from_minor(500));
//! let flipped = row.counterpart(Money::from_minor(200));
//! assert_eq!(flipped.from_user, UserId(2));
//! assert!(flipped.is_flipped);
//! ```

use crate::base::{AccountId, PairKey, UserId};
use crate::money::Money;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

/// One directed balance record between two users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairRow {
    pub id: AccountId,
    pub from_user: UserId,
    pub from_name: String,
    pub to_user: UserId,
    pub to_name: String,
    /// Positive: `to_user` owes `from_user`.
    pub balance: Money,
    /// `true` for the opposite-direction row of the two-row layout.
    pub is_flipped: bool,
}

impl PairRow {
    pub fn canonical(id: AccountId, from: (UserId, &str), to: (UserId, &str), balance: Money) -> Self {
        Self {
            id,
            from_user: from.0,
            from_name: from.1.to_string(),
            to_user: to.0,
            to_name: to.1.to_string(),
            balance,
            is_flipped: false,
        }
    }

    /// The opposite-direction row of the same pair, carrying `balance`.
    ///
    /// In the two-row layout each pair has a canonical row and a flipped row
    /// accumulating debts in the other direction; this builds the latter from
    /// the former (and vice versa).
    pub fn counterpart(&self, balance: Money) -> Self {
        Self {
            id: self.id,
            from_user: self.to_user,
            from_name: self.to_name.clone(),
            to_user: self.from_user,
            to_name: self.from_name.clone(),
            balance,
            is_flipped: !self.is_flipped,
        }
    }

    /// Unordered key of the pair. `None` only for a malformed self-pair.
    pub fn key(&self) -> Option<PairKey> {
        PairKey::new(self.from_user, self.to_user)
    }
}

/// Result of resolving a username against the caller's pair accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterpartyAccount {
    pub account: AccountId,
    pub counterparty: UserId,
    /// `true` when the caller is the `to_user` side of the stored row.
    pub is_flipped: bool,
}

/// Merged, de-duplicated net balance for one unordered pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalBalance {
    pub account: AccountId,
    pub from_user: UserId,
    pub from_name: String,
    pub to_user: UserId,
    pub to_name: String,
    /// Positive: `to_user` owes `from_user`.
    pub balance: Money,
}

impl CanonicalBalance {
    pub fn key(&self) -> Option<PairKey> {
        PairKey::new(self.from_user, self.to_user)
    }

    /// Net position of `user` in this pair: positive when the other side owes them.
    ///
    /// Returns `Money::ZERO` for users outside the pair.
    pub fn position_of(&self, user: UserId) -> Money {
        if user == self.from_user {
            self.balance
        } else if user == self.to_user {
            -self.balance
        } else {
            Money::ZERO
        }
    }
}

impl From<&CanonicalBalance> for PairRow {
    fn from(balance: &CanonicalBalance) -> Self {
        Self {
            id: balance.account,
            from_user: balance.from_user,
            from_name: balance.from_name.clone(),
            to_user: balance.to_user,
            to_name: balance.to_name.clone(),
            balance: balance.balance,
            is_flipped: false,
        }
    }
}

impl Serialize for CanonicalBalance {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("CanonicalBalance", 5)?;
        state.serialize_field("from", &self.from_user)?;
        state.serialize_field("from_name", &self.from_name)?;
        state.serialize_field("to", &self.to_user)?;
        state.serialize_field("to_name", &self.to_name)?;
        state.serialize_field("balance", &self.balance.to_decimal())?;
        state.end()
    }
}
