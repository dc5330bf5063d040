// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reference-counted (group, id) to worker affinity.
//!
//! Each of the 256x256 keys holds an in-flight count and a bound worker
//! index. While the count is non-zero all items for that key land on the
//! same worker, which keeps per-key processing ordered. When the count
//! drains to zero the binding is released and the next item may be placed
//! by the active strategy. Key (0, 0) is the wildcard: it is never sticky
//! and every item for it is placed fresh.

use std::sync::atomic::{AtomicI32, AtomicU64, AtomicU8, AtomicUsize, Ordering};

use super::pool::WorkerPool;

const GROUPS: usize = 256;
const IDS: usize = 256;

/// Placement policy for unbound keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Strategy {
    RoundRobin = 0,
    Random = 1,
    ShortestQueue = 2,
}

impl Strategy {
    pub fn from_name(name: &str) -> Option<Strategy> {
        if name.eq_ignore_ascii_case("roundrobin") {
            Some(Strategy::RoundRobin)
        } else if name.eq_ignore_ascii_case("random") {
            Some(Strategy::Random)
        } else if name.eq_ignore_ascii_case("shortestqueue") {
            Some(Strategy::ShortestQueue)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Strategy::RoundRobin => "RoundRobin",
            Strategy::Random => "Random",
            Strategy::ShortestQueue => "ShortestQueue",
        }
    }

    fn from_u8(raw: u8) -> Strategy {
        match raw {
            1 => Strategy::Random,
            2 => Strategy::ShortestQueue,
            _ => Strategy::RoundRobin,
        }
    }
}

struct Entry {
    count: AtomicU64,
    worker: AtomicI32,
}

pub struct AffinityTable {
    entries: Box<[Entry]>,
    strategy: AtomicU8,
    next: AtomicUsize,
}

impl AffinityTable {
    pub fn new(strategy: Strategy) -> Self {
        let entries: Box<[Entry]> = (0..GROUPS * IDS)
            .map(|_| Entry {
                count: AtomicU64::new(0),
                worker: AtomicI32::new(-1),
            })
            .collect();
        AffinityTable {
            entries,
            strategy: AtomicU8::new(strategy as u8),
            next: AtomicUsize::new(0),
        }
    }

    pub fn strategy(&self) -> Strategy {
        Strategy::from_u8(self.strategy.load(Ordering::Relaxed))
    }

    /// Switches the placement strategy by name. Unknown names keep the
    /// current strategy.
    pub fn set_strategy(&self, name: &str) {
        match Strategy::from_name(name) {
            Some(s) => {
                self.strategy.store(s as u8, Ordering::Relaxed);
                log::info!("[Affinity] assignment strategy set to {}", s.name());
            }
            None => {
                log::warn!(
                    "[Affinity] unknown assignment strategy {:?}, keeping {}",
                    name,
                    self.strategy().name()
                );
            }
        }
    }

    fn entry(&self, group: u8, id: u8) -> &Entry {
        &self.entries[usize::from(group) * IDS + usize::from(id)]
    }

    /// Takes a reference on (group, id) and returns the worker index the
    /// item must go to, or -1 when the pool is empty.
    pub fn assign(&self, pool: &WorkerPool, group: u8, id: u8) -> i32 {
        let n = pool.len();
        if n == 0 {
            return -1;
        }
        let entry = self.entry(group, id);
        // The count goes up before the index is read so a concurrent
        // release cannot unbind the key under an in-flight item.
        entry.count.fetch_add(1, Ordering::AcqRel);
        let bound = entry.worker.load(Ordering::Acquire);
        if bound >= 0 && !(group == 0 && id == 0) {
            return bound;
        }
        let pick = match self.strategy() {
            Strategy::RoundRobin => self.next.fetch_add(1, Ordering::Relaxed) % n,
            Strategy::Random => fastrand::usize(..n),
            Strategy::ShortestQueue => {
                let snap = pool.snapshot();
                let mut best = 0;
                for i in 1..snap.len() {
                    if snap[i].inbound_depth() < snap[best].inbound_depth() {
                        best = i;
                    }
                }
                best
            }
        } as i32;
        entry.worker.store(pick, Ordering::Release);
        pick
    }

    /// Drops one reference on (group, id), unbinding the key when the
    /// last reference goes away. Releasing a key with no references is a
    /// no-op; the deferred outgoing path produces such releases.
    pub fn unassign(&self, group: u8, id: u8) {
        let entry = self.entry(group, id);
        let prev = entry
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1));
        if prev == Ok(1) {
            entry.worker.store(-1, Ordering::Release);
        }
    }

    /// In-flight reference count for a key.
    pub fn refcount(&self, group: u8, id: u8) -> u64 {
        self.entry(group, id).count.load(Ordering::Acquire)
    }

    /// Currently bound worker index for a key, or -1.
    pub fn worker_for(&self, group: u8, id: u8) -> i32 {
        self.entry(group, id).worker.load(Ordering::Acquire)
    }
}
