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

//! Account registry and direct balance operations.
//!
//! The [`AccountRegistry`] maps identifiers to accounts and implements the
//! synchronous deposit, withdraw and transfer operations. Both the public
//! [`Ledger`](crate::Ledger) API and the queue processor go through it, so
//! every balance change lands on the same per-account locks.
//!
//! # Locking
//!
//! - Accounts are stored as `Arc<Account>` in a [`DashMap`]. Lookups clone the
//!   `Arc` and release the map shard before any account lock is taken.
//! - A transfer holds both account locks for its whole duration. Locks are
//!   always acquired in ascending [`AccountId`] order, so two opposing
//!   transfers cannot deadlock.

use crate::account::{Account, AccountSnapshot};
use crate::base::AccountId;
use crate::error::LedgerError;
use crate::transaction::TransferOutcome;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry of ledger accounts.
///
/// # Invariants
///
/// - Account identifiers are unique; registration never replaces an account.
/// - Operations on unknown identifiers fail with
///   [`LedgerError::AccountNotFound`] and never create accounts.
/// - No balance ever goes negative.
#[derive(Debug, Default)]
pub struct AccountRegistry {
    accounts: DashMap<AccountId, Arc<Account>>,
}

fn validate_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount < Decimal::ZERO {
        return Err(LedgerError::InvalidAmount);
    }
    Ok(())
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    /// Registers a new account.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AlreadyExists`] - The identifier is taken.
    /// - [`LedgerError::InvalidAmount`] - The initial balance is negative.
    pub fn add_account(&self, id: AccountId, initial_balance: Decimal) -> Result<(), LedgerError> {
        validate_amount(initial_balance)?;

        // Entry API makes the uniqueness check and insert one atomic step.
        match self.accounts.entry(id) {
            Entry::Occupied(_) => Err(LedgerError::AlreadyExists(id)),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Account::new(id, initial_balance)));
                debug!(account = %id, balance = %initial_balance, "account registered");
                Ok(())
            }
        }
    }

    fn account(&self, id: AccountId) -> Result<Arc<Account>, LedgerError> {
        self.accounts
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(LedgerError::AccountNotFound(id))
    }

    /// Credits `amount` to account `id`.
    ///
    /// Fails with [`LedgerError::Overflow`], leaving the balance unchanged,
    /// if the result would not be representable.
    pub fn deposit(&self, id: AccountId, amount: Decimal) -> Result<(), LedgerError> {
        validate_amount(amount)?;
        let account = self.account(id)?;
        account.deposit(amount)?;
        debug!(account = %id, %amount, "deposit applied");
        Ok(())
    }

    /// Debits `amount` from account `id` if the balance covers it.
    ///
    /// Returns `Ok(false)` without touching the balance when funds are short.
    pub fn withdraw(&self, id: AccountId, amount: Decimal) -> Result<bool, LedgerError> {
        validate_amount(amount)?;
        let account = self.account(id)?;
        let withdrawn = account.withdraw(amount);
        if withdrawn {
            debug!(account = %id, %amount, "withdrawal applied");
        } else {
            info!(account = %id, %amount, "withdrawal rejected: insufficient funds");
        }
        Ok(withdrawn)
    }

    /// Moves `amount` from `source` to `destination` atomically.
    ///
    /// Both accounts are resolved before any lock is taken, so an unknown
    /// destination never leaves the source debited. Likewise the credit is
    /// checked for [`LedgerError::Overflow`] before the debit. A transfer to
    /// the same account only checks that the balance covers `amount`.
    pub fn transfer(
        &self,
        source: AccountId,
        destination: AccountId,
        amount: Decimal,
    ) -> Result<TransferOutcome, LedgerError> {
        validate_amount(amount)?;
        let from = self.account(source)?;
        let to = self.account(destination)?;

        let moved = if source == destination {
            from.lock().balance() >= amount
        } else {
            let (mut from_data, mut to_data) = if source < destination {
                let from_data = from.lock();
                let to_data = to.lock();
                (from_data, to_data)
            } else {
                let to_data = to.lock();
                let from_data = from.lock();
                (from_data, to_data)
            };

            to_data.check_deposit(amount)?;
            if from_data.withdraw(amount) {
                to_data.deposit(amount)?;
                true
            } else {
                false
            }
        };

        if moved {
            debug!(%source, %destination, %amount, "transfer applied");
            Ok(TransferOutcome::Succeeded)
        } else {
            info!(%source, %destination, %amount, "transfer rejected: insufficient funds");
            Ok(TransferOutcome::InsufficientFunds)
        }
    }

    /// Reads the balance of account `id` under its lock.
    pub fn balance(&self, id: AccountId) -> Result<Decimal, LedgerError> {
        Ok(self.account(id)?.balance())
    }

    pub fn contains(&self, id: AccountId) -> bool {
        self.accounts.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Snapshots every account, sorted by identifier.
    ///
    /// Each balance is read under its own lock; the result is not a single
    /// consistent cut across accounts while transactions are in flight.
    pub fn snapshots(&self) -> Vec<AccountSnapshot> {
        let accounts: Vec<Arc<Account>> = self
            .accounts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut snapshots: Vec<AccountSnapshot> =
            accounts.iter().map(|account| account.snapshot()).collect();
        snapshots.sort_by_key(|snapshot| snapshot.id);
        snapshots
    }
}
