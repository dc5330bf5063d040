// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Grow-only worker pool behind an `ArcSwap` snapshot.
//!
//! Readers (the router hot path and the collector sweep) load a snapshot
//! without locking; growth clones the vector under a mutex and swaps the
//! new one in. Workers are never removed, so a worker index handed out by
//! the affinity table stays valid for the life of the pool.

use std::sync::Arc;
use std::thread::ThreadId;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::error::Result;
use crate::rt::WakeNotifier;

use super::worker::{WorkProcessor, Worker};

pub struct WorkerPool {
    workers: ArcSwap<Vec<Arc<Worker>>>,
    grow: Mutex<()>,
}

impl WorkerPool {
    pub fn new() -> Self {
        WorkerPool {
            workers: ArcSwap::from_pointee(Vec::new()),
            grow: Mutex::new(()),
        }
    }

    pub fn len(&self) -> usize {
        self.workers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Arc<Worker>> {
        self.workers.load().get(index).cloned()
    }

    /// Cheap point-in-time view for iteration.
    pub fn snapshot(&self) -> Arc<Vec<Arc<Worker>>> {
        self.workers.load_full()
    }

    /// Appends a worker and returns its index.
    pub fn push_back(&self, worker: Arc<Worker>) -> usize {
        let _guard = self.grow.lock();
        let mut next: Vec<Arc<Worker>> = self.workers.load().as_ref().clone();
        next.push(worker);
        let index = next.len() - 1;
        self.workers.store(Arc::new(next));
        index
    }

    /// Starts every worker that is not yet running.
    pub fn start_all(
        &self,
        processor: &Arc<dyn WorkProcessor>,
        out_wake: &Arc<WakeNotifier>,
    ) -> Result<()> {
        for (index, worker) in self.snapshot().iter().enumerate() {
            worker.start(index, Arc::clone(processor), Arc::clone(out_wake))?;
        }
        Ok(())
    }

    pub fn stop_all(&self) {
        for worker in self.snapshot().iter() {
            worker.stop();
        }
    }

    /// True when every worker thread is alive. Vacuously true for an
    /// empty pool.
    pub fn is_running(&self) -> bool {
        self.snapshot().iter().all(|w| w.is_running())
    }

    /// Maps an OS thread back to its worker index, if the thread belongs
    /// to this pool.
    pub fn locate(&self, thread: ThreadId) -> Option<usize> {
        self.snapshot()
            .iter()
            .position(|w| w.thread_id() == Some(thread))
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}
