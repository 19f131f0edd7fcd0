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

//! User-facing replies.
//!
//! Every reply is a [`Message`] variant carrying exactly the fields it
//! interpolates; `Display` renders it.

use crate::account::CanonicalBalance;
use crate::error::LedgerError;
use crate::transaction::LogEntry;
use crate::view::format_balance_line;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    UserRegistered { username: String },
    AlreadyRegistered,
    UsernameTaken { username: String },
    UsernameNotAllowed { username: String },
    BalanceUpdated { balances: Vec<CanonicalBalance> },
    NothingUpdated,
    Balances { balances: Vec<CanonicalBalance> },
    History { page: u32, entries: Vec<LogEntry> },
    UnknownUser { username: String },
    ConversionFailed,
    UpdateFailed,
    StoreUnavailable,
    InvalidAmount,
    InvalidPage,
    MalformedCommand { reason: String },
}

impl Message {
    /// Reply shown when an operation fails with `error`.
    pub fn from_error(error: &LedgerError) -> Self {
        match error {
            LedgerError::DuplicateUser(_) => Self::AlreadyRegistered,
            LedgerError::DuplicateUsername(name) => Self::UsernameTaken {
                username: name.clone(),
            },
            LedgerError::InvalidUsername(name) => Self::UsernameNotAllowed {
                username: name.clone(),
            },
            LedgerError::UnknownUser(name) => Self::UnknownUser {
                username: name.clone(),
            },
            LedgerError::ConversionError(_) => Self::ConversionFailed,
            LedgerError::StoreUnavailable(_) => Self::StoreUnavailable,
            LedgerError::PartialUpdate(_) => Self::UpdateFailed,
            LedgerError::InvalidAmount => Self::InvalidAmount,
            LedgerError::InvalidPage(_) => Self::InvalidPage,
        }
    }

    /// Reply for a completed posting; an empty result means nothing changed.
    pub fn posted(balances: Vec<CanonicalBalance>) -> Self {
        if balances.is_empty() {
            Self::NothingUpdated
        } else {
            Self::BalanceUpdated { balances }
        }
    }
}

fn write_balances(f: &mut fmt::Formatter<'_>, balances: &[CanonicalBalance]) -> fmt::Result {
    for (i, balance) in balances.iter().enumerate() {
        writeln!(f, "{}) {}", i + 1, format_balance_line(balance))?;
    }
    Ok(())
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserRegistered { username } => write!(f, "@{username} joined the jar"),
            Self::AlreadyRegistered => write!(f, "You are already registered"),
            Self::UsernameTaken { username } => write!(f, "Username @{username} is already taken"),
            Self::UsernameNotAllowed { username } => write!(f, "Username '{username}' cannot be used"),
            Self::BalanceUpdated { balances } => {
                writeln!(f, "Balance updated:")?;
                write_balances(f, balances)
            }
            Self::NothingUpdated => write!(f, "No balances were updated"),
            Self::Balances { balances } if balances.is_empty() => write!(f, "No balances yet"),
            Self::Balances { balances } => write_balances(f, balances),
            Self::History { page, entries } => {
                writeln!(f, "History, page {page}:")?;
                for (i, entry) in entries.iter().enumerate() {
                    writeln!(
                        f,
                        "{}) @{} -> @{}: {}; {}",
                        i + 1,
                        entry.from_name,
                        entry.to_name,
                        entry.amount,
                        entry.comment
                    )?;
                }
                Ok(())
            }
            Self::UnknownUser { username } => write!(f, "Unknown user @{username}"),
            Self::ConversionFailed => write!(f, "Failed to convert currency"),
            Self::UpdateFailed => write!(f, "Failed to update balances, nothing was changed"),
            Self::StoreUnavailable => write!(f, "Storage is unavailable, try again later"),
            Self::InvalidAmount => write!(f, "Amount is not valid"),
            Self::InvalidPage => write!(f, "Page number must be a positive integer"),
            Self::MalformedCommand { reason } => write!(f, "Could not parse command: {reason}"),
        }
    }
}
