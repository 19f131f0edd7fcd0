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

//! Ledger engine.
//!
//! The [`Ledger`] is the central component that registers users, posts debts
//! and answers balance and history queries. It owns no state of its own:
//! everything persistent lives in the [`Store`], and amounts are normalized
//! by a [`CurrencyNormalizer`] before they reach it.
//!
//! # Posting a debt
//!
//! 1. Normalize the amount into base minor units. A failed lookup aborts
//!    before the store is touched.
//! 2. Resolve the targets: explicit usernames, or every counterparty.
//! 3. Split: one target takes the full amount; `N > 1` targets each take
//!    `amount / (N + 1)`, the payer keeping the extra share.
//! 4. Apply all legs in one store transaction and return the merged view.
//!
//! Zero amounts and empty target sets are no-ops and never reach the store's
//! write path.
//!
//! # Thread Safety
//!
//! `Ledger` is `Send + Sync` whenever its store and rate source are; share it
//! behind an `Arc`. Concurrent postings serialize on the store's lock.

use crate::account::{CanonicalBalance, User};
use crate::base::UserId;
use crate::config::Config;
use crate::currency::{Currency, CurrencyNormalizer, RateSource};
use crate::error::LedgerError;
use crate::money::Money;
use crate::store::Store;
use crate::transaction::{DebtLeg, LogEntry, TargetSelector};
use crate::view::merge_duplicates;
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Debt ledger over a [`Store`] and a [`RateSource`].
///
/// # Invariants
///
/// - Every posting is all-or-nothing.
/// - The canonical balance of a pair equals the sum of deltas posted from
///   its `from_user` minus those posted from its `to_user`.
/// - A failed currency conversion never mutates the store.
pub struct Ledger<S, R> {
    store: S,
    normalizer: CurrencyNormalizer<R>,
    history_page_size: usize,
}

impl<S: Store, R: RateSource> Ledger<S, R> {
    pub fn new(store: S, rates: R, config: &Config) -> Self {
        Self {
            store,
            normalizer: CurrencyNormalizer::new(rates, config.base_currency),
            history_page_size: config.history_page_size,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn base_currency(&self) -> Currency {
        self.normalizer.base()
    }

    /// Registers a user and opens a pair account with every existing user.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidUsername`] - empty, `all`, or not mentionable.
    /// - [`LedgerError::DuplicateUser`] - id already registered.
    /// - [`LedgerError::DuplicateUsername`] - name already taken.
    /// - [`LedgerError::StoreUnavailable`] - store deadline expired.
    pub fn register(&self, user_id: UserId, name: &str) -> Result<User, LedgerError> {
        let name = name.strip_prefix('@').unwrap_or(name);
        if !TargetSelector::is_mentionable(name) {
            return Err(LedgerError::InvalidUsername(name.to_string()));
        }
        self.store.create_user_and_pairs(user_id, name)?;
        Ok(User {
            id: user_id,
            name: name.to_string(),
        })
    }

    /// Records that `from_user` paid `amount` of `currency` for `target`.
    ///
    /// Returns the merged balances of every pair the posting touched. Zero
    /// amounts return the payer's current balances unchanged; an empty
    /// target set returns nothing.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ConversionError`] - rate lookup failed; nothing written.
    /// - [`LedgerError::UnknownUser`] - a mentioned username has no pair with the payer.
    /// - [`LedgerError::PartialUpdate`] - a leg failed and the posting was rolled back.
    /// - [`LedgerError::StoreUnavailable`] - store deadline expired.
    pub fn post_debt(
        &self,
        from_user: UserId,
        target: &TargetSelector,
        amount: Decimal,
        currency: Currency,
        comment: &str,
    ) -> Result<Vec<CanonicalBalance>, LedgerError> {
        if amount.is_zero() {
            debug!(user = %from_user, "ignoring zero-amount debt");
            return self.balances(from_user);
        }

        let total = self.normalizer.convert(amount, currency)?;
        if total.is_zero() {
            debug!(user = %from_user, %amount, %currency, "debt rounds to zero, ignoring");
            return self.balances(from_user);
        }

        let counterparties = self.resolve_targets(from_user, target)?;
        if counterparties.is_empty() {
            debug!(user = %from_user, "debt has no counterparties, nothing to post");
            return Ok(Vec::new());
        }

        let legs = split_legs(from_user, &counterparties, total)?;
        let rows = self.store.post_debt_legs(&legs, comment)?;

        info!(
            user = %from_user,
            %total,
            legs = legs.len(),
            share = %legs[0].delta,
            "posted debt"
        );
        Ok(merge_duplicates(&rows))
    }

    /// Current merged balances of every pair `user_id` takes part in.
    pub fn balances(&self, user_id: UserId) -> Result<Vec<CanonicalBalance>, LedgerError> {
        let rows = self.store.list_pairs_for_user(user_id)?;
        Ok(merge_duplicates(&rows))
    }

    /// One page of `user_id`'s transaction log, newest first.
    pub fn history(&self, user_id: UserId, page: u32) -> Result<Vec<LogEntry>, LedgerError> {
        self.store.history_for_user(user_id, page, self.history_page_size)
    }

    /// Resolves the selector into counterparty ids, in mention order.
    ///
    /// Any unknown username aborts the whole resolution.
    fn resolve_targets(&self, from_user: UserId, target: &TargetSelector) -> Result<Vec<UserId>, LedgerError> {
        let mut counterparties = Vec::new();
        match target {
            TargetSelector::Users(names) => {
                for name in names {
                    let account = self.store.lookup_counterparty_account(from_user, name)?;
                    if !counterparties.contains(&account.counterparty) {
                        counterparties.push(account.counterparty);
                    }
                }
            }
            TargetSelector::All => {
                for row in self.store.list_pairs_for_user(from_user)? {
                    let counterparty = if row.from_user == from_user { row.to_user } else { row.from_user };
                    if !counterparties.contains(&counterparty) {
                        counterparties.push(counterparty);
                    }
                }
            }
        }
        Ok(counterparties)
    }
}

/// Builds one leg per counterparty.
///
/// A single counterparty owes the full total; otherwise each owes
/// `total / (N + 1)`, rounded half away from zero.
pub fn split_legs(from_user: UserId, counterparties: &[UserId], total: Money) -> Result<Vec<DebtLeg>, LedgerError> {
    let share = match counterparties.len() {
        0 => return Ok(Vec::new()),
        1 => total,
        n => {
            let parts = u32::try_from(n + 1).map_err(|_| LedgerError::InvalidAmount)?;
            total.split(parts).ok_or(LedgerError::InvalidAmount)?
        }
    };

    Ok(counterparties
        .iter()
        .map(|&to_user| DebtLeg {
            from_user,
            to_user,
            delta: share,
            total,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_target_takes_full_amount() {
        let legs = split_legs(UserId(1), &[UserId(2)], Money::from_minor(300)).unwrap();
        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].delta, Money::from_minor(300));
        assert_eq!(legs[0].total, Money::from_minor(300));
    }

    #[test]
    fn payer_counts_as_one_share() {
        let legs = split_legs(UserId(1), &[UserId(2), UserId(3), UserId(4)], Money::from_minor(100)).unwrap();
        assert!(legs.iter().all(|leg| leg.delta == Money::from_minor(25)));
        assert!(legs.iter().all(|leg| leg.total == Money::from_minor(100)));
    }

    #[test]
    fn split_rounding_is_deterministic() {
        let targets = [UserId(2), UserId(3)];
        let first = split_legs(UserId(1), &targets, Money::from_minor(100)).unwrap();
        let second = split_legs(UserId(1), &targets, Money::from_minor(100)).unwrap();
        assert_eq!(first, second);
        // 100 / 3 = 33.33.. -> 33
        assert_eq!(first[0].delta, Money::from_minor(33));
    }

    #[test]
    fn no_targets_no_legs() {
        assert!(split_legs(UserId(1), &[], Money::from_minor(100)).unwrap().is_empty());
    }
}
