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

//! Balance view: merges raw pair rows into one canonical balance per pair.

use crate::account::{CanonicalBalance, PairRow};
use crate::base::PairKey;
use crate::money::Money;
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Default)]
struct PairGroup<'a> {
    canonical: Vec<&'a PairRow>,
    flipped: Vec<&'a PairRow>,
}

/// Merges canonical and flipped rows into one [`CanonicalBalance`] per pair.
///
/// Rows are grouped by their unordered pair and merged as
/// `balance = canonical.balance - flipped.balance`, oriented like the
/// canonical row. A group holding only a flipped row is reoriented into
/// canonical form; more than one row of the same kind is summed. Both cases
/// are logged as integrity warnings. Output is sorted by pair key.
pub fn merge_duplicates(rows: &[PairRow]) -> Vec<CanonicalBalance> {
    let mut groups: BTreeMap<PairKey, PairGroup<'_>> = BTreeMap::new();
    for row in rows {
        let Some(key) = row.key() else {
            warn!(account = %row.id, user = %row.from_user, "skipping self-referencing pair row");
            continue;
        };
        let group = groups.entry(key).or_default();
        if row.is_flipped {
            group.flipped.push(row);
        } else {
            group.canonical.push(row);
        }
    }

    groups
        .into_iter()
        .filter_map(|(key, group)| merge_group(key, group))
        .collect()
}

fn merge_group(key: PairKey, group: PairGroup<'_>) -> Option<CanonicalBalance> {
    if group.canonical.len() > 1 || group.flipped.len() > 1 {
        warn!(
            low = %key.low,
            high = %key.high,
            canonical = group.canonical.len(),
            flipped = group.flipped.len(),
            "duplicate pair rows, summing"
        );
    }

    let anchor = match group.canonical.first() {
        Some(row) => (*row).clone(),
        None => {
            let row = group.flipped.first()?;
            warn!(
                account = %row.id,
                low = %key.low,
                high = %key.high,
                "flipped pair row without canonical counterpart"
            );
            row.counterpart(Money::ZERO)
        }
    };

    let balance = net_balance(&group).unwrap_or_else(|| {
        warn!(
            account = %anchor.id,
            low = %key.low,
            high = %key.high,
            "pair balance out of range, clamping"
        );
        let canonical: Money = group.canonical.iter().map(|row| row.balance).sum();
        let flipped: Money = group.flipped.iter().map(|row| row.balance).sum();
        canonical - flipped
    });

    Some(CanonicalBalance {
        account: anchor.id,
        from_user: anchor.from_user,
        from_name: anchor.from_name,
        to_user: anchor.to_user,
        to_name: anchor.to_name,
        balance,
    })
}

/// `canonical - flipped`, or `None` when any step leaves the money range.
fn net_balance(group: &PairGroup<'_>) -> Option<Money> {
    let total = |rows: &[&PairRow]| rows.iter().try_fold(Money::ZERO, |sum, row| sum.checked_add(row.balance));
    total(&group.canonical)?.checked_sub(total(&group.flipped)?)
}

/// Renders one balance so the named debtor always owes a non-negative amount.
///
/// A zero balance is rendered with `to_name` as the debtor.
pub fn format_balance_line(balance: &CanonicalBalance) -> String {
    if balance.balance.is_negative() {
        format!("{} owes {} {}", balance.from_name, balance.to_name, -balance.balance)
    } else {
        format!("{} owes {} {}", balance.to_name, balance.from_name, balance.balance)
    }
}
