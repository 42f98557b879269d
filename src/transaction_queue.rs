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

//! Bounded, closable transaction queue.
//!
//! Wraps a bounded [`crossbeam::channel`] so that producers block while the
//! buffer is full and get [`LedgerError::QueueClosed`] once the queue has been
//! closed, instead of panicking.

use crate::error::LedgerError;
use crate::transaction::{TransactionOutcome, TransactionRequest};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use std::time::{Duration, Instant};

/// A request travelling through the queue, with its delivery metadata.
#[derive(Debug)]
pub(crate) struct QueuedTransaction {
    pub(crate) request: TransactionRequest,
    pub(crate) deadline: Option<Instant>,
    pub(crate) reply: Option<Sender<TransactionOutcome>>,
}

impl QueuedTransaction {
    pub(crate) fn new(request: TransactionRequest, timeout: Option<Duration>) -> Self {
        Self {
            request,
            deadline: timeout.map(|t| Instant::now() + t),
            reply: None,
        }
    }

    /// Attaches a one-slot reply channel and returns its [`Receipt`].
    pub(crate) fn with_receipt(mut self) -> (Self, Receipt) {
        let (tx, rx) = channel::bounded(1);
        self.reply = Some(tx);
        (self, Receipt { outcome: rx })
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now > deadline)
    }

    /// Sends the outcome to the receipt holder, if any.
    ///
    /// The reply channel has one slot and receives exactly one message, so
    /// this never blocks. A dropped receipt is ignored.
    pub(crate) fn reply(self, outcome: TransactionOutcome) {
        if let Some(reply) = self.reply {
            let _ = reply.try_send(outcome);
        }
    }
}

/// Completion handle for a submitted transaction.
#[derive(Debug)]
pub struct Receipt {
    outcome: Receiver<TransactionOutcome>,
}

impl Receipt {
    /// Blocks until the processor reports the outcome.
    ///
    /// Every accepted transaction is eventually dequeued and answered, by
    /// the processor or by the drain in [`Ledger::shutdown`](crate::Ledger::shutdown).
    /// `None` means the transaction was dropped unanswered, which only
    /// happens if the ledger itself is leaked or torn down mid-panic.
    pub fn wait(self) -> Option<TransactionOutcome> {
        self.outcome.recv().ok()
    }

    /// Like [`Receipt::wait`], giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<TransactionOutcome> {
        match self.outcome.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Returns the outcome if it is already available.
    pub fn try_outcome(&self) -> Option<TransactionOutcome> {
        self.outcome.try_recv().ok()
    }
}

/// A bounded FIFO queue of transactions with explicit close semantics.
///
/// The queue keeps the only long-lived [`Sender`]. Producers clone it for the
/// duration of a single send, so closing the queue rejects new producers
/// while sends already in flight still complete and get drained.
#[derive(Debug)]
pub(crate) struct TransactionQueue {
    sender: RwLock<Option<Sender<QueuedTransaction>>>,
    receiver: Receiver<QueuedTransaction>,
    capacity: usize,
}

impl TransactionQueue {
    /// Creates an empty queue holding at most `capacity` pending transactions.
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, receiver) = channel::bounded(capacity);
        Self {
            sender: RwLock::new(Some(sender)),
            receiver,
            capacity,
        }
    }

    /// Adds a transaction, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::QueueClosed`] if the queue was closed.
    pub(crate) fn push(&self, transaction: QueuedTransaction) -> Result<(), LedgerError> {
        // Clone out of the lock so a blocked send never holds it.
        let sender = self
            .sender
            .read()
            .as_ref()
            .cloned()
            .ok_or(LedgerError::QueueClosed)?;
        sender.send(transaction).map_err(|_| LedgerError::QueueClosed)
    }

    /// Stops accepting transactions. Returns `false` if already closed.
    pub(crate) fn close(&self) -> bool {
        self.sender.write().take().is_some()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Consumer end of the queue. Iterating it ends once the queue is
    /// closed and every buffered transaction has been received.
    pub(crate) fn receiver(&self) -> Receiver<QueuedTransaction> {
        self.receiver.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.receiver.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}
