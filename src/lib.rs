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

//! # Bank Ledger
//!
//! An in-memory bank ledger. Deposits, withdrawals and transfers can be
//! applied directly from any thread, or queued for a single background
//! processor that applies them in order.
//!
//! ## Core Components
//!
//! - [`Ledger`]: Owns the accounts, the transaction queue and the processor
//! - [`AccountRegistry`]: Account map and the direct balance operations
//! - [`AccountSnapshot`]: Point-in-time copy of one account balance
//! - [`TransactionRequest`]: A deposit, withdrawal or transfer to be queued
//! - [`LedgerError`]: Error types for ledger operations
//!
//! ## Example
//!
//! ```
//! use bank_ledger_rs::{AccountId, Ledger, TransactionOutcome, TransactionRequest};
//! use rust_decimal_macros::dec;
//!
//! let ledger = Ledger::new();
//! ledger.add_account(AccountId(5), dec!(0)).unwrap();
//!
//! // Direct operations return their result immediately
//! ledger.deposit(AccountId(5), dec!(50)).unwrap();
//! assert!(ledger.withdraw(AccountId(5), dec!(20)).unwrap());
//! assert_eq!(ledger.get_balance(AccountId(5)).unwrap(), dec!(30));
//!
//! // Queued transactions are applied by the background processor
//! ledger.start().unwrap();
//! let receipt = ledger
//!     .submit(TransactionRequest::withdraw(AccountId(5), dec!(100)))
//!     .unwrap();
//! assert_eq!(
//!     receipt.wait(),
//!     Some(TransactionOutcome::InsufficientFunds(AccountId(5)))
//! );
//! ledger.shutdown();
//! ```
//!
//! ## Thread Safety
//!
//! Every account has its own lock. Transfers hold both account locks, taken
//! in ascending identifier order, so concurrent transfers never deadlock and
//! never expose a half-applied state.

mod account;
mod base;
pub mod config;
pub mod error;
mod ledger;
mod lifecycle;
mod processor;
mod registry;
mod transaction;
mod transaction_queue;

pub use account::AccountSnapshot;
pub use base::AccountId;
pub use config::LedgerConfig;
pub use error::{ConfigError, LedgerError};
pub use ledger::Ledger;
pub use lifecycle::LifecycleState;
pub use processor::ProcessingStats;
pub use registry::AccountRegistry;
pub use transaction::{TransactionKind, TransactionOutcome, TransactionRequest, TransferOutcome};
pub use transaction_queue::Receipt;
