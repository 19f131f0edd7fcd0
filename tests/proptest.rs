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

//! Property-based tests for the ledger engine.
//!
//! These tests verify invariants that should hold for any sequence of
//! valid postings.

use moneyjar_rs::{
    AccountId, Config, Currency, FixedRates, Ledger, MemoryStore, Money, PairKey, PairRow, TargetSelector, UserId,
    merge_duplicates, split_legs,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

const USERS: i64 = 5;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Generate a positive amount in cents (0.01 to 10000.00).
fn arb_cents() -> impl Strategy<Value = i64> {
    1i64..=1_000_000i64
}

/// A posting: payer, non-empty set of other users, amount in cents.
fn arb_posting() -> impl Strategy<Value = (i64, Vec<i64>, i64)> {
    (1..=USERS, prop::collection::btree_set(1..=USERS, 1..USERS as usize), arb_cents()).prop_filter_map(
        "payer must have at least one target",
        |(payer, targets, cents)| {
            let targets: Vec<i64> = targets.into_iter().filter(|t| *t != payer).collect();
            (!targets.is_empty()).then_some((payer, targets, cents))
        },
    )
}

fn arb_row() -> impl Strategy<Value = PairRow> {
    (1..=USERS, 1..=USERS, -100_000i64..=100_000i64).prop_filter_map("self pair", |(a, b, balance)| {
        let key = PairKey::new(UserId(a), UserId(b))?;
        Some(PairRow::canonical(
            AccountId((key.low.0 * 10 + key.high.0) as u64),
            (key.low, &format!("user{}", key.low.0)),
            (key.high, &format!("user{}", key.high.0)),
            Money::from_minor(balance),
        ))
    })
}

fn ledger() -> Ledger<MemoryStore, FixedRates> {
    let ledger = Ledger::new(MemoryStore::new(), FixedRates::new(Currency::Usd), &Config::default());
    for id in 1..=USERS {
        ledger.register(UserId(id), &format!("user{id}")).unwrap();
    }
    ledger
}

// =============================================================================
// Posting Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every pair balance equals the deltas posted low->high minus those posted high->low.
    #[test]
    fn balances_conserve_posted_deltas(postings in prop::collection::vec(arb_posting(), 1..20)) {
        let ledger = ledger();
        let mut model: BTreeMap<PairKey, i64> = BTreeMap::new();
        let mut legs_posted = 0;

        for (payer, targets, cents) in &postings {
            let mentions = targets.iter().map(|t| format!("user{t}")).collect::<Vec<_>>().join(" ");
            ledger
                .post_debt(
                    UserId(*payer),
                    &TargetSelector::parse(&mentions),
                    Decimal::new(*cents, 2),
                    Currency::Usd,
                    "",
                )
                .unwrap();

            let ids: Vec<UserId> = targets.iter().map(|t| UserId(*t)).collect();
            for leg in split_legs(UserId(*payer), &ids, Money::from_minor(*cents)).unwrap() {
                let key = PairKey::new(leg.from_user, leg.to_user).unwrap();
                let signed = if leg.from_user == key.low { leg.delta.minor() } else { -leg.delta.minor() };
                *model.entry(key).or_default() += signed;
                legs_posted += 1;
            }
        }

        for id in 1..=USERS {
            for balance in ledger.balances(UserId(id)).unwrap() {
                let key = balance.key().unwrap();
                prop_assert_eq!(balance.balance.minor(), model.get(&key).copied().unwrap_or(0));
            }
        }
        prop_assert_eq!(ledger.store().log_len().unwrap(), legs_posted);
    }

    /// Both sides of a pair always see opposite positions.
    #[test]
    fn positions_are_antisymmetric(postings in prop::collection::vec(arb_posting(), 1..10)) {
        let ledger = ledger();
        for (payer, _, cents) in &postings {
            ledger
                .post_debt(UserId(*payer), &TargetSelector::All, Decimal::new(*cents, 2), Currency::Usd, "")
                .unwrap();
        }

        for balance in ledger.balances(UserId(1)).unwrap() {
            prop_assert_eq!(balance.position_of(balance.from_user), -balance.position_of(balance.to_user));
        }
    }
}

// =============================================================================
// Balance View Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Merging already-canonical output changes nothing.
    #[test]
    fn merge_is_idempotent(rows in prop::collection::vec(arb_row(), 0..20)) {
        let merged = merge_duplicates(&rows);
        let rows_again: Vec<PairRow> = merged.iter().map(PairRow::from).collect();

        prop_assert_eq!(merge_duplicates(&rows_again), merged);
    }

    /// At most one balance per unordered pair, sorted by pair.
    #[test]
    fn merge_yields_one_sorted_balance_per_pair(rows in prop::collection::vec(arb_row(), 0..20)) {
        let merged = merge_duplicates(&rows);
        let keys: Vec<PairKey> = merged.iter().map(|b| b.key().unwrap()).collect();

        let mut sorted = keys.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(keys, sorted);
    }

    /// A flipped row offsets its canonical row.
    #[test]
    fn merge_subtracts_flipped_rows(row in arb_row(), flipped in -100_000i64..=100_000i64) {
        let rows = vec![row.counterpart(Money::from_minor(flipped)), row.clone()];
        let merged = merge_duplicates(&rows);

        prop_assert_eq!(merged.len(), 1);
        prop_assert_eq!(merged[0].from_user, row.from_user);
        prop_assert_eq!(merged[0].balance, row.balance - Money::from_minor(flipped));
    }
}

// =============================================================================
// Split Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Splitting is deterministic and off by at most half a share.
    #[test]
    fn split_is_deterministic_and_close(amount in -10_000_000i64..=10_000_000i64, parts in 1u32..50) {
        let money = Money::from_minor(amount);
        let share = money.split(parts).unwrap();

        prop_assert_eq!(money.split(parts), Some(share));
        let error = (share.minor() * i64::from(parts) - amount).abs();
        prop_assert!(2 * error <= i64::from(parts));
    }

    /// Rounding is symmetric around zero.
    #[test]
    fn split_is_symmetric(amount in 0i64..=10_000_000i64, parts in 1u32..50) {
        let money = Money::from_minor(amount);
        prop_assert_eq!((-money).split(parts), money.split(parts).map(|share| -share));
    }

    /// Every leg of one posting carries the same share and the full total.
    #[test]
    fn legs_share_one_amount(cents in arb_cents(), targets in 1usize..10) {
        let ids: Vec<UserId> = (2..2 + targets as i64).map(UserId).collect();
        let legs = split_legs(UserId(1), &ids, Money::from_minor(cents)).unwrap();

        prop_assert_eq!(legs.len(), targets);
        prop_assert!(legs.iter().all(|leg| leg.delta == legs[0].delta));
        prop_assert!(legs.iter().all(|leg| leg.total == Money::from_minor(cents)));
        if targets == 1 {
            prop_assert_eq!(legs[0].delta, Money::from_minor(cents));
        }
    }
}
