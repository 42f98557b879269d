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

//! Account management.
//!
//! Every [`Account`] owns its balance behind its own mutex. The balance is
//! never read or written without holding that lock. Accounts are created
//! and mutated only through the [`AccountRegistry`](crate::AccountRegistry),
//! which rejects negative amounts before any lock is taken.

use crate::base::AccountId;
use crate::error::LedgerError;
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Balance state guarded by the account lock.
#[derive(Debug)]
pub(crate) struct AccountData {
    id: AccountId,
    balance: Decimal,
}

impl AccountData {
    fn new(id: AccountId, balance: Decimal) -> Self {
        Self { id, balance }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: balance went negative: {}",
            self.balance
        );
    }

    pub(crate) fn balance(&self) -> Decimal {
        self.balance
    }

    /// Returns [`LedgerError::Overflow`] if crediting `amount` would exceed
    /// the largest representable balance.
    pub(crate) fn check_deposit(&self, amount: Decimal) -> Result<Decimal, LedgerError> {
        self.balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow(self.id))
    }

    /// Increases the balance. Nothing changes on overflow.
    pub(crate) fn deposit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        debug_assert!(amount >= Decimal::ZERO);
        self.balance = self.check_deposit(amount)?;
        self.assert_invariants();
        Ok(())
    }

    /// Decreases the balance if it covers `amount`.
    ///
    /// Check and subtraction happen under the same borrow, so callers holding
    /// the lock never expose an intermediate state.
    pub(crate) fn withdraw(&mut self, amount: Decimal) -> bool {
        debug_assert!(amount >= Decimal::ZERO);
        if self.balance < amount {
            return false;
        }
        self.balance -= amount;
        self.assert_invariants();
        true
    }
}

/// Ledger account.
///
/// Amounts passed here must already be validated as non-negative.
#[derive(Debug)]
pub(crate) struct Account {
    id: AccountId,
    inner: Mutex<AccountData>,
}

impl Account {
    pub(crate) fn new(id: AccountId, balance: Decimal) -> Self {
        Self {
            id,
            inner: Mutex::new(AccountData::new(id, balance)),
        }
    }

    pub(crate) fn balance(&self) -> Decimal {
        self.inner.lock().balance
    }

    pub(crate) fn deposit(&self, amount: Decimal) -> Result<(), LedgerError> {
        self.inner.lock().deposit(amount)
    }

    /// Returns `false` and leaves the balance untouched when funds are short.
    pub(crate) fn withdraw(&self, amount: Decimal) -> bool {
        self.inner.lock().withdraw(amount)
    }

    pub(crate) fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            id: self.id,
            balance: self.balance(),
        }
    }

    /// Acquires the account lock for a multi-step critical section.
    pub(crate) fn lock(&self) -> MutexGuard<'_, AccountData> {
        self.inner.lock()
    }
}

/// Point-in-time copy of an account balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub id: AccountId,
    pub balance: Decimal,
}

impl AccountSnapshot {
    const DECIMAL_PRECISION: u32 = 2;
}

impl Serialize for AccountSnapshot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("AccountSnapshot", 2)?;
        state.serialize_field("account", &self.id)?;
        state.serialize_field(
            "balance",
            &self.balance.round_dp(AccountSnapshot::DECIMAL_PRECISION),
        )?;
        state.end()
    }
}
