// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Park/wake coordination between ring producers and their consumer.
//!
//! Each worker parks on one of these when its inbound ring is empty; the
//! output collector parks on a shared one when every outbound ring is
//! empty. Producers call `notify()` after each successful push, which on
//! the hot path is a single atomic store plus an uncontended lock of the
//! parked counter. Waits are always bounded, so a lost wakeup can only
//! cost one idle interval before the consumer re-polls its ring.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One-shot wake flag with a condvar behind it for parked consumers.
///
/// `notify()` latches the flag; `wait_timeout()` consumes it. Multiple
/// notifies before a wait coalesce into one. Spurious wakeups are fine,
/// the consumer re-checks its ring after every wake.
#[derive(Debug)]
pub struct WakeNotifier {
    pending: AtomicBool,
    parked: Mutex<usize>,
    wake: Condvar,
}

impl WakeNotifier {
    pub fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            parked: Mutex::new(0),
            wake: Condvar::new(),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Latch a pending wake and rouse a parked consumer if there is one.
    ///
    /// The parked-count read races the consumer's park decision; the worst
    /// case is one spare signal, never a lost item (the flag is latched
    /// before the count is read).
    #[inline]
    pub fn notify(&self) {
        self.pending.store(true, Ordering::Release);
        if *self.parked.lock() > 0 {
            self.wake.notify_one();
        }
    }

    fn consume(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Park until notified or `timeout` elapses, whichever comes first.
    /// Returns true when a notify was consumed.
    ///
    /// A notify that is already pending returns immediately without
    /// touching the lock.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.consume() {
            return true;
        }
        let mut parked = self.parked.lock();
        // Re-check under the lock: a notify may have landed between the
        // fast path and taking the lock, before the count went up.
        if self.consume() {
            return true;
        }
        *parked += 1;
        let _ = self.wake.wait_for(&mut parked, timeout);
        *parked -= 1;
        drop(parked);
        self.consume()
    }
}

impl Default for WakeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
