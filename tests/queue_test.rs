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

//! Transaction queue, processor and lifecycle integration tests.

use bank_ledger_rs::{
    AccountId, Ledger, LedgerConfig, LedgerError, LifecycleState, TransactionOutcome,
    TransactionRequest,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

fn ledger_with(config: LedgerConfig, accounts: &[(u32, Decimal)]) -> Ledger {
    let ledger = Ledger::with_config(config).unwrap();
    for (id, balance) in accounts {
        ledger.add_account(AccountId(*id), *balance).unwrap();
    }
    ledger
}

#[test]
fn queued_transfer_applied_after_drain() {
    let ledger = ledger_with(LedgerConfig::default(), &[(1, dec!(1000)), (2, dec!(500))]);
    ledger.start().unwrap();

    ledger
        .enqueue(TransactionRequest::transfer(AccountId(1), AccountId(2), dec!(300)))
        .unwrap();
    ledger.shutdown();

    assert_eq!(ledger.get_balance(AccountId(1)), Ok(dec!(700)));
    assert_eq!(ledger.get_balance(AccountId(2)), Ok(dec!(800)));
}

#[test]
fn queued_transactions_apply_in_fifo_order() {
    // Each withdrawal only succeeds if the deposit queued before it was
    // applied first.
    let ledger = ledger_with(LedgerConfig::default(), &[(1, dec!(0))]);
    ledger.start().unwrap();

    for i in 1..=500 {
        let amount = Decimal::from(i);
        ledger
            .enqueue(TransactionRequest::deposit(AccountId(1), amount))
            .unwrap();
        ledger
            .enqueue(TransactionRequest::withdraw(AccountId(1), amount))
            .unwrap();
    }
    ledger.shutdown();

    let stats = ledger.stats();
    assert_eq!(stats.processed, 1000);
    assert_eq!(stats.applied, 1000);
    assert_eq!(stats.failed, 0);
    assert_eq!(ledger.get_balance(AccountId(1)), Ok(dec!(0)));
}

#[test]
fn receipts_observe_order_dependent_outcomes() {
    let ledger = ledger_with(LedgerConfig::default(), &[(1, dec!(100))]);

    // Queued before start: buffered, then processed in order.
    let first = ledger
        .submit(TransactionRequest::withdraw(AccountId(1), dec!(80)))
        .unwrap();
    let second = ledger
        .submit(TransactionRequest::withdraw(AccountId(1), dec!(80)))
        .unwrap();
    ledger.start().unwrap();

    assert_eq!(first.wait(), Some(TransactionOutcome::Applied));
    assert_eq!(
        second.wait(),
        Some(TransactionOutcome::InsufficientFunds(AccountId(1)))
    );
    assert_eq!(ledger.get_balance(AccountId(1)), Ok(dec!(20)));
}

#[test]
fn processor_failures_reach_the_receipt_only() {
    let ledger = ledger_with(LedgerConfig::default(), &[(1, dec!(100))]);
    ledger.start().unwrap();

    // enqueue itself succeeds; the failure happens later on the processor
    ledger
        .enqueue(TransactionRequest::deposit(AccountId(42), dec!(1)))
        .unwrap();
    let receipt = ledger
        .submit(TransactionRequest::deposit(AccountId(42), dec!(1)))
        .unwrap();
    assert_eq!(
        receipt.wait(),
        Some(TransactionOutcome::Rejected(LedgerError::AccountNotFound(
            AccountId(42)
        )))
    );

    let negative = ledger
        .submit(TransactionRequest::withdraw(AccountId(1), dec!(-5)))
        .unwrap();
    assert_eq!(
        negative.wait(),
        Some(TransactionOutcome::Rejected(LedgerError::InvalidAmount))
    );

    ledger.shutdown();
    assert_eq!(ledger.stats().failed, 3);
    assert_eq!(ledger.get_balance(AccountId(1)), Ok(dec!(100)));
}

#[test]
fn full_queue_blocks_producer_until_space_frees() {
    let config = LedgerConfig::default().with_queue_capacity(2);
    let ledger = Arc::new(ledger_with(config, &[(1, dec!(0))]));

    // Processor not started: the queue fills up.
    ledger
        .enqueue(TransactionRequest::deposit(AccountId(1), dec!(1)))
        .unwrap();
    ledger
        .enqueue(TransactionRequest::deposit(AccountId(1), dec!(1)))
        .unwrap();
    assert_eq!(ledger.pending(), 2);

    let enqueued = Arc::new(AtomicBool::new(false));
    let producer = {
        let ledger = Arc::clone(&ledger);
        let enqueued = Arc::clone(&enqueued);
        thread::spawn(move || {
            ledger
                .enqueue(TransactionRequest::deposit(AccountId(1), dec!(1)))
                .unwrap();
            enqueued.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!enqueued.load(Ordering::SeqCst), "producer should be blocked");
    assert_eq!(ledger.pending(), 2);

    ledger.start().unwrap();
    producer.join().unwrap();
    assert!(enqueued.load(Ordering::SeqCst));

    ledger.shutdown();
    assert_eq!(ledger.get_balance(AccountId(1)), Ok(dec!(3)));
    assert_eq!(ledger.stats().applied, 3);
}

#[test]
fn enqueue_after_shutdown_fails() {
    let ledger = ledger_with(LedgerConfig::default(), &[(1, dec!(0))]);
    ledger.start().unwrap();
    ledger.shutdown();

    assert!(!ledger.is_accepting());
    assert_eq!(
        ledger.enqueue(TransactionRequest::deposit(AccountId(1), dec!(1))),
        Err(LedgerError::QueueClosed)
    );
    assert_eq!(
        ledger
            .submit(TransactionRequest::deposit(AccountId(1), dec!(1)))
            .unwrap_err(),
        LedgerError::QueueClosed
    );
    assert_eq!(ledger.get_balance(AccountId(1)), Ok(dec!(0)));

    // Direct operations keep working after shutdown
    ledger.deposit(AccountId(1), dec!(5)).unwrap();
    assert_eq!(ledger.get_balance(AccountId(1)), Ok(dec!(5)));
}

#[test]
fn start_is_guarded() {
    let ledger = Ledger::new();
    assert_eq!(ledger.state(), LifecycleState::Idle);
    ledger.start().unwrap();
    assert_eq!(ledger.state(), LifecycleState::Running);
    assert_eq!(ledger.start(), Err(LedgerError::AlreadyStarted));

    ledger.shutdown();
    assert_eq!(ledger.state(), LifecycleState::Stopped);
    assert_eq!(ledger.start(), Err(LedgerError::AlreadyStarted));
}

#[test]
fn shutdown_is_idempotent() {
    let ledger = ledger_with(LedgerConfig::default(), &[(1, dec!(0))]);
    ledger.start().unwrap();
    for _ in 0..5 {
        ledger
            .enqueue(TransactionRequest::deposit(AccountId(1), dec!(2)))
            .unwrap();
    }

    ledger.shutdown();
    ledger.shutdown();
    ledger.shutdown();

    assert_eq!(ledger.state(), LifecycleState::Stopped);
    assert_eq!(ledger.stats().processed, 5);
    assert_eq!(ledger.get_balance(AccountId(1)), Ok(dec!(10)));
}

#[test]
fn concurrent_shutdown_callers_all_see_drained_ledger() {
    let ledger = Arc::new(ledger_with(LedgerConfig::default(), &[(1, dec!(0))]));
    ledger.start().unwrap();
    for _ in 0..100 {
        ledger
            .enqueue(TransactionRequest::deposit(AccountId(1), dec!(1)))
            .unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                ledger.shutdown();
                (ledger.state(), ledger.get_balance(AccountId(1)).unwrap())
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(
            handle.join().unwrap(),
            (LifecycleState::Stopped, dec!(100))
        );
    }
}

#[test]
fn shutdown_racing_producers_loses_no_accepted_transaction() {
    let config = LedgerConfig::default().with_queue_capacity(4);
    let ledger = Arc::new(ledger_with(config, &[(1, dec!(0))]));
    ledger.start().unwrap();

    let accepted = Arc::new(AtomicU32::new(0));
    let producers: Vec<_> = (0..4)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let accepted = Arc::clone(&accepted);
            thread::spawn(move || {
                for _ in 0..1_000 {
                    match ledger.enqueue(TransactionRequest::deposit(AccountId(1), dec!(1))) {
                        Ok(()) => {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(LedgerError::QueueClosed) => break,
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(5));
    ledger.shutdown();
    for producer in producers {
        producer.join().unwrap();
    }

    let accepted = accepted.load(Ordering::SeqCst);
    assert_eq!(ledger.stats().processed, u64::from(accepted));
    assert_eq!(ledger.get_balance(AccountId(1)), Ok(Decimal::from(accepted)));
}

#[test]
fn stale_transactions_time_out() {
    let config = LedgerConfig::default().with_transaction_timeout(Duration::from_millis(10));
    let ledger = ledger_with(config, &[(1, dec!(100))]);

    let receipt = ledger
        .submit(TransactionRequest::withdraw(AccountId(1), dec!(50)))
        .unwrap();
    thread::sleep(Duration::from_millis(50));
    ledger.start().unwrap();

    assert_eq!(receipt.wait(), Some(TransactionOutcome::TimedOut));
    ledger.shutdown();
    assert_eq!(ledger.stats().timed_out, 1);
    assert_eq!(ledger.get_balance(AccountId(1)), Ok(dec!(100)));
}

#[test]
fn direct_and_queued_operations_share_account_locks() {
    let ledger = Arc::new(ledger_with(
        LedgerConfig::default(),
        &[(1, dec!(0)), (2, dec!(0))],
    ));
    ledger.start().unwrap();

    let direct = {
        let ledger = Arc::clone(&ledger);
        thread::spawn(move || {
            for _ in 0..1_000 {
                ledger.deposit(AccountId(1), dec!(1)).unwrap();
                ledger
                    .transfer(AccountId(1), AccountId(2), dec!(0.5))
                    .unwrap();
            }
        })
    };

    for _ in 0..1_000 {
        ledger
            .enqueue(TransactionRequest::deposit(AccountId(2), dec!(1)))
            .unwrap();
    }

    direct.join().unwrap();
    ledger.shutdown();

    // Account 1 always has at least 1 when its transfer runs.
    assert_eq!(ledger.get_balance(AccountId(1)), Ok(dec!(500)));
    assert_eq!(ledger.get_balance(AccountId(2)), Ok(dec!(1500)));
}

#[test]
fn receipt_wait_timeout_returns_none_while_pending() {
    let ledger = ledger_with(LedgerConfig::default(), &[(1, dec!(0))]);
    let receipt = ledger
        .submit(TransactionRequest::deposit(AccountId(1), dec!(1)))
        .unwrap();

    // Not started yet, so nothing has been processed.
    assert_eq!(receipt.wait_timeout(Duration::from_millis(20)), None);

    ledger.start().unwrap();
    assert_eq!(
        receipt.wait_timeout(Duration::from_secs(5)),
        Some(TransactionOutcome::Applied)
    );
}

#[test]
fn failed_queued_item_does_not_stop_processing() {
    let ledger = ledger_with(LedgerConfig::default(), &[(1, Decimal::MAX), (2, dec!(10))]);
    ledger.start().unwrap();

    let overflowing = ledger
        .submit(TransactionRequest::deposit(AccountId(1), dec!(1)))
        .unwrap();
    assert_eq!(
        overflowing.wait(),
        Some(TransactionOutcome::Rejected(LedgerError::Overflow(AccountId(1))))
    );

    let receipt = ledger
        .submit(TransactionRequest::deposit(AccountId(2), dec!(1)))
        .unwrap();
    assert_eq!(receipt.wait(), Some(TransactionOutcome::Applied));
    assert_eq!(ledger.state(), LifecycleState::Running);

    let receipts: Vec<_> = (0..20)
        .map(|_| {
            ledger
                .submit(TransactionRequest::transfer(AccountId(2), AccountId(1), dec!(0)))
                .unwrap()
        })
        .collect();
    for _ in 0..5 {
        ledger
            .enqueue(TransactionRequest::deposit(AccountId(2), dec!(1)))
            .unwrap();
    }
    ledger.shutdown();

    // Zero-amount transfers into a full account still fit.
    for receipt in receipts {
        assert_eq!(receipt.try_outcome(), Some(TransactionOutcome::Applied));
    }
    assert_eq!(ledger.get_balance(AccountId(1)), Ok(Decimal::MAX));
    assert_eq!(ledger.get_balance(AccountId(2)), Ok(dec!(16)));

    let stats = ledger.stats();
    assert_eq!(stats.processed, 27);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.applied, 26);
}
