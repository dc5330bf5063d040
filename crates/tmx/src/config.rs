// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TMX fabric defaults and configuration keys - single source of truth.
//!
//! Runtime tunables (worker count, assignment strategy, overflow capacity)
//! are applied through [`crate::MessageManager::on_config_changed`] using the
//! key constants below. **Never hardcode these values elsewhere!**

/// Default number of worker threads started by a manager.
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Hard upper bound on the worker pool size.
///
/// Reconfiguration may only grow the pool; requests above this bound are
/// ignored.
pub const MAX_WORKER_THREADS: usize = 512;

/// Default inbound-queue depth above which new admissions are rejected.
///
/// A value of 0 disables the overflow check entirely.
pub const DEFAULT_OVERFLOW_CAPACITY: usize = 1000;

/// Capacity of each worker's inbound and outbound ring (rounded up to a
/// power of two by the ring itself). Must exceed the overflow capacity or
/// the ring rejects items before the admission check does.
pub const DEFAULT_RING_CAPACITY: usize = 2048;

/// Default assignment strategy name.
pub const DEFAULT_ASSIGNMENT_STRATEGY: &str = "RoundRobin";

/// Configuration key: number of worker threads (only increases are honored).
pub const CFG_WORKER_THREADS: &str = "WorkerThreads";

/// Configuration key: assignment strategy name (case-insensitive).
pub const CFG_ASSIGNMENT_STRATEGY: &str = "AssignmentStrategy";

/// Configuration key: overflow capacity (0 disables the check).
pub const CFG_OVERFLOW_CAPACITY: &str = "OverflowCapacity";

/// How long an idle worker or the output collector sleeps before re-polling
/// its wake predicate (bounded wait, tolerant of missed notifies).
pub const IDLE_WAIT_MS: u64 = 10;
