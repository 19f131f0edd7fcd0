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

//! Debt postings: target selection, legs and the audit log.

use crate::base::UserId;
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who a debt is posted against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetSelector {
    /// Explicitly mentioned usernames.
    Users(Vec<String>),
    /// Every registered counterparty of the payer.
    All,
}

impl TargetSelector {
    const ALL: &'static str = "all";

    /// Parses `all`/`@all` or a list of whitespace or comma separated mentions.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.trim_start_matches('@').eq_ignore_ascii_case(Self::ALL) {
            return Self::All;
        }
        Self::Users(
            trimmed
                .split(|c: char| c.is_whitespace() || c == ',')
                .map(|name| name.trim_start_matches('@'))
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Returns `true` when `name` would come back from [`parse`](Self::parse)
    /// as a single mention of itself.
    pub fn is_mentionable(name: &str) -> bool {
        !name.is_empty()
            && !name.starts_with('@')
            && !name.eq_ignore_ascii_case(Self::ALL)
            && !name.chars().any(|c| c.is_whitespace() || c == ',')
    }
}

/// One directed balance adjustment.
///
/// A positive `delta` increases what `to_user` owes `from_user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebtLeg {
    pub from_user: UserId,
    pub to_user: UserId,
    /// Amount applied to the pair balance.
    pub delta: Money,
    /// Pre-split amount recorded in the log.
    pub total: Money,
}

/// Append-only audit record, one per posted leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub from_user: UserId,
    pub from_name: String,
    pub to_user: UserId,
    pub to_name: String,
    pub amount: Money,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn involves(&self, user: UserId) -> bool {
        self.from_user == user || self.to_user == user
    }
}
