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

//! Error types for ledger operations.

use crate::base::AccountId;
use thiserror::Error;

/// Ledger operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Referenced account is not registered
    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    /// Account identifier is already registered
    #[error("account {0} already exists")]
    AlreadyExists(AccountId),

    /// Source account cannot cover the requested amount
    #[error("insufficient funds in account {0}")]
    InsufficientFunds(AccountId),

    /// Crediting the account would exceed the largest representable balance
    #[error("balance of account {0} would overflow")]
    Overflow(AccountId),

    /// Amount is negative
    #[error("invalid amount (must not be negative)")]
    InvalidAmount,

    /// Queued request lacks the account its kind requires
    #[error("transaction is missing a source or destination account")]
    MissingAccount,

    /// Queue no longer accepts transactions
    #[error("transaction queue is closed")]
    QueueClosed,

    /// Processor was already started
    #[error("transaction processor already started")]
    AlreadyStarted,

    /// Processor thread could not be created
    #[error("failed to spawn transaction processor: {0}")]
    WorkerSpawn(String),

    /// Applying a queued transaction panicked; the processor kept running
    #[error("transaction processing panicked: {0}")]
    ProcessingPanicked(String),
}

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Queue capacity must hold at least one pending transaction
    #[error("queue capacity must be at least 1")]
    ZeroCapacity,

    /// Environment variable could not be parsed
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}
