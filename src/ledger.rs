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

//! The bank ledger.
//!
//! The [`Ledger`] owns the accounts, the bounded transaction queue and the
//! processor lifecycle. It offers two ways to move money:
//!
//! - **Direct operations** ([`Ledger::deposit`], [`Ledger::withdraw`],
//!   [`Ledger::transfer`]) run on the caller's thread and return their result.
//! - **Queued transactions** ([`Ledger::enqueue`], [`Ledger::submit`]) are
//!   applied by a single background processor in enqueue order.
//!
//! Both paths share the same per-account locks, so they may run concurrently.
//!
//! # Example
//!
//! ```
//! use bank_ledger_rs::{AccountId, Ledger, TransactionRequest};
//! use rust_decimal_macros::dec;
//!
//! let ledger = Ledger::new();
//! ledger.add_account(AccountId(1), dec!(1000)).unwrap();
//! ledger.add_account(AccountId(2), dec!(500)).unwrap();
//! ledger.start().unwrap();
//!
//! ledger
//!     .enqueue(TransactionRequest::transfer(AccountId(1), AccountId(2), dec!(300)))
//!     .unwrap();
//! ledger.shutdown();
//!
//! assert_eq!(ledger.get_balance(AccountId(1)).unwrap(), dec!(700));
//! assert_eq!(ledger.get_balance(AccountId(2)).unwrap(), dec!(800));
//! ```

use crate::account::AccountSnapshot;
use crate::base::AccountId;
use crate::config::LedgerConfig;
use crate::error::{ConfigError, LedgerError};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::processor::{ProcessingStats, ProcessorStats, TransactionProcessor};
use crate::registry::AccountRegistry;
use crate::transaction::{TransactionRequest, TransferOutcome};
use crate::transaction_queue::{QueuedTransaction, Receipt, TransactionQueue};
use rust_decimal::Decimal;
use std::sync::Arc;

/// In-memory bank ledger with a single-consumer transaction queue.
///
/// # Invariants
///
/// - Account identifiers are unique and accounts are never removed.
/// - Queued transactions are applied in enqueue order by exactly one worker.
/// - After [`Ledger::shutdown`] returns, every accepted transaction has been
///   processed and further enqueues fail with [`LedgerError::QueueClosed`].
///
/// Dropping the ledger shuts it down.
#[derive(Debug)]
pub struct Ledger {
    registry: Arc<AccountRegistry>,
    queue: TransactionQueue,
    lifecycle: Lifecycle,
    stats: Arc<ProcessorStats>,
    config: LedgerConfig,
}

impl Ledger {
    /// Creates a ledger with the default configuration.
    pub fn new() -> Self {
        Self::build(LedgerConfig::default())
    }

    /// Creates a ledger with a custom configuration.
    pub fn with_config(config: LedgerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: LedgerConfig) -> Self {
        Self {
            registry: Arc::new(AccountRegistry::new()),
            queue: TransactionQueue::new(config.queue_capacity),
            lifecycle: Lifecycle::new(),
            stats: Arc::new(ProcessorStats::default()),
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // === Accounts and direct operations ===

    /// Registers an account with a starting balance.
    ///
    /// Safe to call while the processor is running.
    pub fn add_account(&self, id: AccountId, initial_balance: Decimal) -> Result<(), LedgerError> {
        self.registry.add_account(id, initial_balance)
    }

    pub fn deposit(&self, id: AccountId, amount: Decimal) -> Result<(), LedgerError> {
        self.registry.deposit(id, amount)
    }

    /// Returns `Ok(false)` when the balance does not cover `amount`.
    pub fn withdraw(&self, id: AccountId, amount: Decimal) -> Result<bool, LedgerError> {
        self.registry.withdraw(id, amount)
    }

    pub fn transfer(
        &self,
        source: AccountId,
        destination: AccountId,
        amount: Decimal,
    ) -> Result<TransferOutcome, LedgerError> {
        self.registry.transfer(source, destination, amount)
    }

    pub fn get_balance(&self, id: AccountId) -> Result<Decimal, LedgerError> {
        self.registry.balance(id)
    }

    /// All accounts, sorted by identifier.
    pub fn accounts(&self) -> Vec<AccountSnapshot> {
        self.registry.snapshots()
    }

    // === Queue ===

    /// Queues a transaction for the background processor.
    ///
    /// Blocks while the queue is full. The outcome is only reported through
    /// the log; use [`Ledger::submit`] to observe it.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::QueueClosed`] once shutdown has begun.
    pub fn enqueue(&self, request: TransactionRequest) -> Result<(), LedgerError> {
        self.queue
            .push(QueuedTransaction::new(request, self.config.transaction_timeout))
    }

    /// Queues a transaction and returns a [`Receipt`] for its outcome.
    pub fn submit(&self, request: TransactionRequest) -> Result<Receipt, LedgerError> {
        let (queued, receipt) =
            QueuedTransaction::new(request, self.config.transaction_timeout).with_receipt();
        self.queue.push(queued)?;
        Ok(receipt)
    }

    /// Number of transactions waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn is_accepting(&self) -> bool {
        !self.queue.is_closed()
    }

    pub fn stats(&self) -> ProcessingStats {
        self.stats.snapshot()
    }

    // === Lifecycle ===

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Spawns the transaction processor.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AlreadyStarted`] if called more than once or
    /// after shutdown.
    pub fn start(&self) -> Result<(), LedgerError> {
        let processor = self.processor();
        let receiver = self.queue.receiver();
        self.lifecycle
            .start(&self.config.worker_name, move || processor.run(receiver))
    }

    /// Closes the queue, processes every buffered transaction and joins the
    /// processor. Blocks until done; later calls are no-ops.
    pub fn shutdown(&self) {
        self.lifecycle.shutdown(
            || {
                self.queue.close();
            },
            || self.processor().run(self.queue.receiver()),
        );
    }

    fn processor(&self) -> TransactionProcessor {
        TransactionProcessor::new(Arc::clone(&self.registry), Arc::clone(&self.stats))
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Ledger {
    fn drop(&mut self) {
        self.shutdown();
    }
}
