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

//! Account pair store.
//!
//! The [`Store`] trait owns users, pair rows and the transaction log. Every
//! mutating operation runs inside one transaction: either all of its writes
//! become visible or none do.
//!
//! [`MemoryStore`] keeps everything behind a single [`RwLock`]. A mutating
//! call holds the write guard for the lifetime of a [`Transaction`], stages
//! its writes next to the guard and applies them in [`Transaction::commit`].
//! Dropping an uncommitted transaction discards the staged writes and
//! releases the lock.
//!
//! Lock acquisition is bounded by a deadline; expiry is reported as
//! [`LedgerError::StoreUnavailable`].

use crate::account::{CounterpartyAccount, PairRow, User};
use crate::base::{AccountId, PairKey, UserId};
use crate::error::LedgerError;
use crate::money::Money;
use crate::transaction::{DebtLeg, LogEntry};
use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Persistence contract of the ledger.
pub trait Store: Send + Sync {
    /// Registers a user and creates a pair row against every existing user.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::DuplicateUser`] - id already registered.
    /// - [`LedgerError::DuplicateUsername`] - name already taken.
    /// - [`LedgerError::StoreUnavailable`] - deadline expired.
    fn create_user_and_pairs(&self, user_id: UserId, name: &str) -> Result<(), LedgerError>;

    fn user(&self, user_id: UserId) -> Result<Option<User>, LedgerError>;

    /// Resolves `to_username` to the pair row shared with `from_user`.
    ///
    /// Fails with [`LedgerError::UnknownUser`] when the name is unknown, names
    /// the caller, or no pair row connects the two.
    fn lookup_counterparty_account(
        &self,
        from_user: UserId,
        to_username: &str,
    ) -> Result<CounterpartyAccount, LedgerError>;

    /// All pair rows `user_id` takes part in, with display names.
    fn list_pairs_for_user(&self, user_id: UserId) -> Result<Vec<PairRow>, LedgerError>;

    /// Applies every leg in one transaction and returns the touched rows.
    ///
    /// Each leg appends one log entry with its pre-split total. If any leg
    /// fails nothing is written and [`LedgerError::PartialUpdate`] is returned.
    fn post_debt_legs(&self, legs: &[DebtLeg], comment: &str) -> Result<Vec<PairRow>, LedgerError>;

    /// Log entries involving `user_id`, newest first, `page` counted from 1.
    fn history_for_user(
        &self,
        user_id: UserId,
        page: u32,
        page_size: usize,
    ) -> Result<Vec<LogEntry>, LedgerError>;
}

#[derive(Debug, Clone, Copy)]
struct AccountRecord {
    id: AccountId,
    balance: Money,
}

#[derive(Debug, Default)]
struct StoreData {
    users: BTreeMap<UserId, String>,
    usernames: HashMap<String, UserId>,
    accounts: BTreeMap<PairKey, AccountRecord>,
    next_account_id: u64,
    log: Vec<LogEntry>,
}

impl StoreData {
    fn row(&self, key: &PairKey, record: AccountRecord) -> PairRow {
        PairRow::canonical(
            record.id,
            (key.low, self.name_of(key.low)),
            (key.high, self.name_of(key.high)),
            record.balance,
        )
    }

    fn name_of(&self, user: UserId) -> &str {
        self.users.get(&user).map(String::as_str).unwrap_or_default()
    }
}

/// Writes staged by an open transaction.
#[derive(Debug, Default)]
struct Staged {
    user: Option<(UserId, String)>,
    accounts: BTreeMap<PairKey, AccountRecord>,
    balances: BTreeMap<PairKey, Money>,
    log: Vec<LogEntry>,
}

impl Staged {
    fn is_empty(&self) -> bool {
        self.user.is_none() && self.accounts.is_empty() && self.balances.is_empty() && self.log.is_empty()
    }
}

/// Scoped write transaction over [`StoreData`].
///
/// Holds the write lock until dropped; reads see staged writes.
struct Transaction<'a> {
    data: RwLockWriteGuard<'a, StoreData>,
    staged: Staged,
    committed: bool,
}

impl<'a> Transaction<'a> {
    fn new(data: RwLockWriteGuard<'a, StoreData>) -> Self {
        Self {
            data,
            staged: Staged::default(),
            committed: false,
        }
    }

    fn name_of(&self, user: UserId) -> Option<&str> {
        match &self.staged.user {
            Some((id, name)) if *id == user => Some(name.as_str()),
            _ => self.data.users.get(&user).map(String::as_str),
        }
    }

    fn account(&self, key: &PairKey) -> Option<AccountRecord> {
        let record = self
            .staged
            .accounts
            .get(key)
            .or_else(|| self.data.accounts.get(key))
            .copied()?;
        let balance = self.staged.balances.get(key).copied().unwrap_or(record.balance);
        Some(AccountRecord { balance, ..record })
    }

    fn insert_user(&mut self, user_id: UserId, name: &str) -> Result<(), LedgerError> {
        if self.data.users.contains_key(&user_id) {
            return Err(LedgerError::DuplicateUser(user_id));
        }
        if self.data.usernames.contains_key(name) {
            return Err(LedgerError::DuplicateUsername(name.to_string()));
        }
        self.staged.user = Some((user_id, name.to_string()));
        Ok(())
    }

    fn insert_account(&mut self, key: PairKey) -> AccountId {
        let id = AccountId(self.data.next_account_id + self.staged.accounts.len() as u64 + 1);
        self.staged.accounts.insert(
            key,
            AccountRecord {
                id,
                balance: Money::ZERO,
            },
        );
        id
    }

    /// Stages one leg and returns the key of the pair it touched.
    fn apply_leg(&mut self, leg: &DebtLeg, comment: &str, timestamp: DateTime<Utc>) -> Result<PairKey, String> {
        let key = PairKey::new(leg.from_user, leg.to_user)
            .ok_or_else(|| format!("user {} cannot owe themselves", leg.from_user))?;
        let record = self
            .account(&key)
            .ok_or_else(|| format!("no pair account between {} and {}", leg.from_user, leg.to_user))?;

        // Stored orientation is low -> high; a leg from the high side moves it backwards.
        let signed = if leg.from_user == key.low { leg.delta } else { -leg.delta };
        let balance = record
            .balance
            .checked_add(signed)
            .ok_or_else(|| format!("balance overflow on account {}", record.id))?;

        let from_name = self.name_of(leg.from_user).unwrap_or_default().to_string();
        let to_name = self.name_of(leg.to_user).unwrap_or_default().to_string();

        self.staged.balances.insert(key, balance);
        self.staged.log.push(LogEntry {
            from_user: leg.from_user,
            from_name,
            to_user: leg.to_user,
            to_name,
            amount: leg.total,
            comment: comment.to_string(),
            timestamp,
        });
        Ok(key)
    }

    fn row(&self, key: &PairKey) -> Option<PairRow> {
        let record = self.account(key)?;
        Some(PairRow::canonical(
            record.id,
            (key.low, self.name_of(key.low).unwrap_or_default()),
            (key.high, self.name_of(key.high).unwrap_or_default()),
            record.balance,
        ))
    }

    fn commit(mut self) {
        let staged = std::mem::take(&mut self.staged);
        let data = &mut *self.data;

        if let Some((id, name)) = staged.user {
            data.usernames.insert(name.clone(), id);
            data.users.insert(id, name);
        }
        data.next_account_id += staged.accounts.len() as u64;
        data.accounts.extend(staged.accounts);
        for (key, balance) in staged.balances {
            if let Some(record) = data.accounts.get_mut(&key) {
                record.balance = balance;
            }
        }
        data.log.extend(staged.log);

        self.committed = true;
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.staged.is_empty() {
            debug!(
                staged_balances = self.staged.balances.len(),
                staged_log_entries = self.staged.log.len(),
                "rolling back transaction"
            );
        }
    }
}

/// In-process [`Store`] guarded by a single reader-writer lock.
#[derive(Debug)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
    lock_timeout: Duration,
}

impl MemoryStore {
    pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

    pub fn new() -> Self {
        Self::with_lock_timeout(Self::DEFAULT_LOCK_TIMEOUT)
    }

    /// Creates a store whose operations give up after waiting `lock_timeout` for the lock.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            data: RwLock::new(StoreData::default()),
            lock_timeout,
        }
    }

    /// Number of stored pair rows.
    pub fn pair_count(&self) -> Result<usize, LedgerError> {
        Ok(self.read()?.accounts.len())
    }

    /// Number of transaction log entries.
    pub fn log_len(&self) -> Result<usize, LedgerError> {
        Ok(self.read()?.log.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreData>, LedgerError> {
        self.data.try_read_for(self.lock_timeout).ok_or_else(|| {
            LedgerError::StoreUnavailable(format!("read lock not acquired within {:?}", self.lock_timeout))
        })
    }

    fn begin(&self) -> Result<Transaction<'_>, LedgerError> {
        self.data
            .try_write_for(self.lock_timeout)
            .map(Transaction::new)
            .ok_or_else(|| {
                LedgerError::StoreUnavailable(format!("write lock not acquired within {:?}", self.lock_timeout))
            })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn create_user_and_pairs(&self, user_id: UserId, name: &str) -> Result<(), LedgerError> {
        let mut tx = self.begin()?;
        tx.insert_user(user_id, name)?;

        let others: Vec<UserId> = tx.data.users.keys().copied().collect();
        for other in &others {
            // Ids are distinct here: `insert_user` rejected a duplicate.
            if let Some(key) = PairKey::new(user_id, *other) {
                tx.insert_account(key);
            }
        }

        tx.commit();
        info!(user = %user_id, username = name, pairs = others.len(), "registered user");
        Ok(())
    }

    fn user(&self, user_id: UserId) -> Result<Option<User>, LedgerError> {
        let data = self.read()?;
        Ok(data.users.get(&user_id).map(|name| User {
            id: user_id,
            name: name.clone(),
        }))
    }

    fn lookup_counterparty_account(
        &self,
        from_user: UserId,
        to_username: &str,
    ) -> Result<CounterpartyAccount, LedgerError> {
        let name = to_username.trim_start_matches('@');
        let unknown = || LedgerError::UnknownUser(name.to_string());

        let data = self.read()?;
        let counterparty = data.usernames.get(name).copied().ok_or_else(unknown)?;
        let key = PairKey::new(from_user, counterparty).ok_or_else(unknown)?;
        let record = data.accounts.get(&key).ok_or_else(unknown)?;

        Ok(CounterpartyAccount {
            account: record.id,
            counterparty,
            is_flipped: from_user != key.low,
        })
    }

    fn list_pairs_for_user(&self, user_id: UserId) -> Result<Vec<PairRow>, LedgerError> {
        let data = self.read()?;
        Ok(data
            .accounts
            .iter()
            .filter(|(key, _)| key.contains(user_id))
            .map(|(key, record)| data.row(key, *record))
            .collect())
    }

    fn post_debt_legs(&self, legs: &[DebtLeg], comment: &str) -> Result<Vec<PairRow>, LedgerError> {
        let mut tx = self.begin()?;
        let timestamp = Utc::now();
        let mut touched: Vec<PairKey> = Vec::with_capacity(legs.len());

        for (index, leg) in legs.iter().enumerate() {
            let key = tx.apply_leg(leg, comment, timestamp).map_err(|reason| {
                warn!(leg = index, %reason, "debt leg failed, rolling back");
                LedgerError::PartialUpdate(reason)
            })?;
            if !touched.contains(&key) {
                touched.push(key);
            }
        }

        let rows: Vec<PairRow> = touched.iter().filter_map(|key| tx.row(key)).collect();
        tx.commit();
        Ok(rows)
    }

    fn history_for_user(
        &self,
        user_id: UserId,
        page: u32,
        page_size: usize,
    ) -> Result<Vec<LogEntry>, LedgerError> {
        if page == 0 {
            return Err(LedgerError::InvalidPage(page));
        }
        let page_size = page_size.max(1);
        let skip = (page as usize - 1).saturating_mul(page_size);

        let data = self.read()?;
        Ok(data
            .log
            .iter()
            .rev()
            .filter(|entry| entry.involves(user_id))
            .skip(skip)
            .take(page_size)
            .cloned()
            .collect())
    }
}
