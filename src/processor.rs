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

//! Single-consumer transaction processor.
//!
//! The processor drains the transaction queue one request at a time and
//! applies each through the [`AccountRegistry`]. Because there is exactly one
//! consumer, queued transactions take effect in enqueue order.
//!
//! Outcomes are reported through `tracing` events and, for requests submitted
//! with a [`Receipt`](crate::Receipt), through the receipt. A producer that
//! used plain `enqueue` never learns whether its transaction failed; the log
//! is the only record.
//!
//! A panic while applying one transaction is caught and reported as
//! [`LedgerError::ProcessingPanicked`]; the processor moves on to the next.

use crate::error::LedgerError;
use crate::registry::AccountRegistry;
use crate::transaction::{TransactionKind, TransactionOutcome, TransactionRequest, TransferOutcome};
use crate::transaction_queue::QueuedTransaction;
use crossbeam::channel::Receiver;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{error, info, warn};

/// Counters updated by the processor.
#[derive(Debug, Default)]
pub(crate) struct ProcessorStats {
    processed: AtomicU64,
    applied: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
}

impl ProcessorStats {
    fn record(&self, outcome: &TransactionOutcome) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            TransactionOutcome::Applied => &self.applied,
            TransactionOutcome::TimedOut => &self.timed_out,
            TransactionOutcome::InsufficientFunds(_) | TransactionOutcome::Rejected(_) => {
                &self.failed
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ProcessingStats {
        ProcessingStats {
            processed: self.processed.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the processor counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    /// Transactions dequeued, whatever their outcome.
    pub processed: u64,
    pub applied: u64,
    /// Insufficient funds or rejected requests.
    pub failed: u64,
    pub timed_out: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct TransactionProcessor {
    registry: Arc<AccountRegistry>,
    stats: Arc<ProcessorStats>,
}

impl TransactionProcessor {
    pub(crate) fn new(registry: Arc<AccountRegistry>, stats: Arc<ProcessorStats>) -> Self {
        Self { registry, stats }
    }

    /// Processes transactions until the queue is closed and empty.
    ///
    /// Returns the number of transactions handled by this call.
    pub(crate) fn run(&self, receiver: Receiver<QueuedTransaction>) -> u64 {
        let mut handled = 0;
        for queued in receiver.iter() {
            self.process(queued);
            handled += 1;
        }
        handled
    }

    fn process(&self, queued: QueuedTransaction) {
        self.process_with(queued, |request| self.apply(request));
    }

    fn process_with<F>(&self, queued: QueuedTransaction, apply: F)
    where
        F: FnOnce(&TransactionRequest) -> TransactionOutcome,
    {
        let request = queued.request;
        let outcome = if queued.is_expired(Instant::now()) {
            TransactionOutcome::TimedOut
        } else {
            // Account locks are parking_lot mutexes and do not poison, and no
            // balance is written before its checks pass.
            panic::catch_unwind(AssertUnwindSafe(|| apply(&request))).unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!(kind = %request.kind, %message, "transaction processing panicked");
                TransactionOutcome::Rejected(LedgerError::ProcessingPanicked(message))
            })
        };

        report(&request, &outcome);
        self.stats.record(&outcome);
        queued.reply(outcome);
    }

    fn apply(&self, request: &TransactionRequest) -> TransactionOutcome {
        match self.try_apply(request) {
            Ok(outcome) => outcome,
            Err(error) => TransactionOutcome::Rejected(error),
        }
    }

    fn try_apply(&self, request: &TransactionRequest) -> Result<TransactionOutcome, LedgerError> {
        let amount = request.amount;
        match request.kind {
            TransactionKind::Deposit => {
                self.registry.deposit(request.destination()?, amount)?;
                Ok(TransactionOutcome::Applied)
            }
            TransactionKind::Withdraw => {
                let source = request.source()?;
                if self.registry.withdraw(source, amount)? {
                    Ok(TransactionOutcome::Applied)
                } else {
                    Ok(TransactionOutcome::InsufficientFunds(source))
                }
            }
            TransactionKind::Transfer => {
                let source = request.source()?;
                let destination = request.destination()?;
                match self.registry.transfer(source, destination, amount)? {
                    TransferOutcome::Succeeded => Ok(TransactionOutcome::Applied),
                    TransferOutcome::InsufficientFunds => {
                        Ok(TransactionOutcome::InsufficientFunds(source))
                    }
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn report(request: &TransactionRequest, outcome: &TransactionOutcome) {
    let kind = request.kind;
    let amount = request.amount;
    let source = request.source.map(|id| id.0);
    let destination = request.destination.map(|id| id.0);

    match outcome {
        TransactionOutcome::Applied => match kind {
            TransactionKind::Deposit => {
                info!(%kind, ?destination, %amount, "deposited {amount} into account")
            }
            TransactionKind::Withdraw => {
                info!(%kind, ?source, %amount, "withdrew {amount} from account")
            }
            TransactionKind::Transfer => {
                info!(%kind, ?source, ?destination, %amount, "transferred {amount} between accounts")
            }
        },
        TransactionOutcome::InsufficientFunds(account) => {
            warn!(%kind, account = %account, %amount, "{kind} failed: insufficient funds")
        }
        TransactionOutcome::Rejected(error) => {
            warn!(%kind, ?source, ?destination, %amount, %error, "{kind} rejected")
        }
        TransactionOutcome::TimedOut => {
            warn!(%kind, ?source, ?destination, %amount, "{kind} dropped: deadline passed before processing")
        }
    }
}
