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

//! Error types for ledger operations and configuration loading.

use crate::base::UserId;
use thiserror::Error;

/// Ledger operation errors.
///
/// Every storage-mutating operation is transactional, so none of these
/// errors leaves a half-applied posting behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A user with this id is already registered
    #[error("user {0} is already registered")]
    DuplicateUser(UserId),

    /// Another user already registered under this name
    #[error("username '{0}' is already taken")]
    DuplicateUsername(String),

    /// Name is empty, reserved, or cannot be mentioned
    #[error("username '{0}' is not allowed")]
    InvalidUsername(String),

    /// Username or pair account not found
    #[error("unknown user '{0}'")]
    UnknownUser(String),

    /// Currency lookup or conversion failed
    #[error("currency conversion failed: {0}")]
    ConversionError(String),

    /// Store could not be reached before the deadline
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A posting was rolled back; safe to retry
    #[error("update rolled back: {0}")]
    PartialUpdate(String),

    /// Amount is not finite or does not fit into minor units
    #[error("invalid amount")]
    InvalidAmount,

    /// History pages are numbered from 1
    #[error("invalid history page {0}")]
    InvalidPage(u32),
}

impl LedgerError {
    /// Returns `true` for failures that leave no trace and may be retried as is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::PartialUpdate(_) | Self::ConversionError(_)
        )
    }
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
