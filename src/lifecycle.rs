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

//! Processor lifecycle.
//!
//! Implemented State Machine
//!
//  Idle ──start──► Running ──shutdown──► Draining ──worker joined──► Stopped
//   │                                       ▲
//   └──────────────shutdown─────────────────┘  (buffer drained on the caller)

use crate::error::LedgerError;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::thread::{self, JoinHandle};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed; transactions are buffered but not processed.
    Idle,
    /// Worker is dequeuing transactions.
    Running,
    /// Queue closed; remaining transactions are being processed.
    Draining,
    /// Worker exited and was joined.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct LifecycleData {
    state: LifecycleState,
    worker: Option<JoinHandle<u64>>,
}

/// Runs the processor at most once and joins it exactly once.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    inner: Mutex<LifecycleData>,
    stopped: Condvar,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(LifecycleData {
                state: LifecycleState::Idle,
                worker: None,
            }),
            stopped: Condvar::new(),
        }
    }

    pub(crate) fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    /// Spawns `work` on a named thread and moves to [`LifecycleState::Running`].
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AlreadyStarted`] - Any state other than `Idle`.
    /// - [`LedgerError::WorkerSpawn`] - The OS refused to create the thread.
    pub(crate) fn start<F>(&self, name: &str, work: F) -> Result<(), LedgerError>
    where
        F: FnOnce() -> u64 + Send + 'static,
    {
        let mut data = self.inner.lock();
        if data.state != LifecycleState::Idle {
            return Err(LedgerError::AlreadyStarted);
        }

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(work)
            .map_err(|e| LedgerError::WorkerSpawn(e.to_string()))?;

        data.worker = Some(handle);
        data.state = LifecycleState::Running;
        info!(worker = name, "transaction processor started");
        Ok(())
    }

    /// Closes the queue via `close`, waits for the backlog to drain and
    /// moves to [`LifecycleState::Stopped`].
    ///
    /// When the worker was never started, or its thread died, `drain_inline`
    /// processes the backlog on the calling thread. Callers arriving while another call is
    /// draining block until it finishes; calls after that return at once.
    pub(crate) fn shutdown<C, D>(&self, close: C, drain_inline: D)
    where
        C: FnOnce(),
        D: FnOnce() -> u64,
    {
        let mut data = self.inner.lock();
        let worker = match data.state {
            LifecycleState::Stopped => return,
            LifecycleState::Draining => {
                while data.state != LifecycleState::Stopped {
                    self.stopped.wait(&mut data);
                }
                return;
            }
            LifecycleState::Idle => None,
            LifecycleState::Running => data.worker.take(),
        };

        data.state = LifecycleState::Draining;
        close();
        drop(data);
        info!("transaction queue closed, draining");

        match worker {
            Some(handle) => match handle.join() {
                Ok(processed) => info!(processed, "transaction processor stopped"),
                Err(_) => {
                    error!("transaction processor panicked; draining on the calling thread");
                    let processed = drain_inline();
                    info!(processed, "drained transactions after processor failure");
                }
            },
            None => {
                let processed = drain_inline();
                info!(processed, "drained transactions without a running processor");
            }
        }

        let mut data = self.inner.lock();
        data.state = LifecycleState::Stopped;
        self.stopped.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[test]
    fn start_twice_fails() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::Idle);
        lifecycle.start("worker", || 0).unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Running);
        assert_eq!(
            lifecycle.start("worker", || 0),
            Err(LedgerError::AlreadyStarted)
        );
        lifecycle.shutdown(|| {}, || 0);
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[test]
    fn start_after_shutdown_fails() {
        let lifecycle = Lifecycle::new();
        lifecycle.shutdown(|| {}, || 0);
        assert_eq!(
            lifecycle.start("worker", || 0),
            Err(LedgerError::AlreadyStarted)
        );
    }

    #[test]
    fn shutdown_closes_and_drains_exactly_once() {
        let lifecycle = Lifecycle::new();
        let closes = AtomicU32::new(0);
        let drains = AtomicU32::new(0);

        for _ in 0..3 {
            lifecycle.shutdown(
                || {
                    closes.fetch_add(1, Ordering::SeqCst);
                },
                || {
                    drains.fetch_add(1, Ordering::SeqCst);
                    0
                },
            );
        }

        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(drains.load(Ordering::SeqCst), 1);
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[test]
    fn running_worker_is_joined_not_drained_inline() {
        let lifecycle = Lifecycle::new();
        let runs = Arc::new(AtomicU32::new(0));
        let worker_runs = Arc::clone(&runs);
        lifecycle
            .start("worker", move || {
                worker_runs.fetch_add(1, Ordering::SeqCst);
                1
            })
            .unwrap();

        lifecycle.shutdown(|| {}, || panic!("worker is running; nothing to drain inline"));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dead_worker_backlog_is_drained_inline() {
        let lifecycle = Lifecycle::new();
        lifecycle
            .start("worker", || panic!("processor thread died"))
            .unwrap();
        let drains = AtomicU32::new(0);

        lifecycle.shutdown(
            || {},
            || {
                drains.fetch_add(1, Ordering::SeqCst);
                0
            },
        );

        assert_eq!(drains.load(Ordering::SeqCst), 1);
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[test]
    fn concurrent_shutdown_waits_for_stop() {
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle
            .start("worker", || {
                std::thread::sleep(Duration::from_millis(50));
                0
            })
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lifecycle = Arc::clone(&lifecycle);
                std::thread::spawn(move || {
                    lifecycle.shutdown(|| {}, || 0);
                    lifecycle.state()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), LifecycleState::Stopped);
        }
    }
}
