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

//! Transaction requests and their outcomes.
//!
//! A [`TransactionRequest`] is what producers hand to the queue. Once the
//! processor has applied it, the result is reported as a
//! [`TransactionOutcome`].

use crate::base::AccountId;
use crate::error::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Transfer,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Transfer => "transfer",
        };
        f.write_str(name)
    }
}

/// A request to move funds, processed asynchronously by the ledger.
///
/// `source` is read by withdrawals and transfers, `destination` by deposits
/// and transfers. Requests built with [`TransactionRequest::deposit`],
/// [`TransactionRequest::withdraw`] or [`TransactionRequest::transfer`]
/// always carry the ids their kind needs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionRequest {
    pub kind: TransactionKind,
    pub source: Option<AccountId>,
    pub destination: Option<AccountId>,
    pub amount: Decimal,
}

impl TransactionRequest {
    pub fn deposit(destination: AccountId, amount: Decimal) -> Self {
        Self {
            kind: TransactionKind::Deposit,
            source: None,
            destination: Some(destination),
            amount,
        }
    }

    pub fn withdraw(source: AccountId, amount: Decimal) -> Self {
        Self {
            kind: TransactionKind::Withdraw,
            source: Some(source),
            destination: None,
            amount,
        }
    }

    pub fn transfer(source: AccountId, destination: AccountId, amount: Decimal) -> Self {
        Self {
            kind: TransactionKind::Transfer,
            source: Some(source),
            destination: Some(destination),
            amount,
        }
    }

    pub(crate) fn source(&self) -> Result<AccountId, LedgerError> {
        self.source.ok_or(LedgerError::MissingAccount)
    }

    pub(crate) fn destination(&self) -> Result<AccountId, LedgerError> {
        self.destination.ok_or(LedgerError::MissingAccount)
    }
}

/// Result of a direct transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Succeeded,
    InsufficientFunds,
}

/// Result of a queued transaction, as reported by the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// Balances were updated.
    Applied,
    /// Source account could not cover the amount; nothing changed.
    InsufficientFunds(AccountId),
    /// Request could not be applied (unknown account, bad amount, ...).
    Rejected(LedgerError),
    /// Deadline passed before the processor dequeued the request.
    TimedOut,
}

impl TransactionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn constructors_fill_required_accounts() {
        let deposit = TransactionRequest::deposit(AccountId(1), dec!(10));
        assert_eq!(deposit.destination(), Ok(AccountId(1)));
        assert_eq!(deposit.source(), Err(LedgerError::MissingAccount));

        let withdraw = TransactionRequest::withdraw(AccountId(2), dec!(10));
        assert_eq!(withdraw.source(), Ok(AccountId(2)));
        assert_eq!(withdraw.destination(), Err(LedgerError::MissingAccount));

        let transfer = TransactionRequest::transfer(AccountId(1), AccountId(2), dec!(10));
        assert_eq!(transfer.source(), Ok(AccountId(1)));
        assert_eq!(transfer.destination(), Ok(AccountId(2)));
    }

    #[test]
    fn kind_deserializes_from_lowercase() {
        let kind: TransactionKind = serde_json::from_str("\"transfer\"").unwrap();
        assert_eq!(kind, TransactionKind::Transfer);
        assert_eq!(TransactionKind::Withdraw.to_string(), "withdraw");
    }

    #[test]
    fn only_applied_counts_as_applied() {
        assert!(TransactionOutcome::Applied.is_applied());
        assert!(!TransactionOutcome::TimedOut.is_applied());
        assert!(!TransactionOutcome::InsufficientFunds(AccountId(1)).is_applied());
    }
}
