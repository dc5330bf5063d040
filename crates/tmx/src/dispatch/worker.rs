// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decode worker: one OS thread fed by an inbound work ring, draining into
//! an outbound completion ring.
//!
//! The rings are single-consumer (the worker thread pops inbound, the
//! collector pops outbound) but each has more than one producer: any
//! caller thread admits onto the inbound ring, and the outbound ring is
//! fed by both the worker loop and the deferred outgoing path. Each
//! producer side is serialized by a small lock; the pop sides stay
//! lock-free.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::IDLE_WAIT_MS;
use crate::error::{Error, Result};
use crate::message::{Completion, WorkItem};
use crate::rt::{SpscRing, WakeNotifier};

/// Per-item processing hook run on the worker thread.
///
/// Every item yields exactly one [`Completion`], even when decoding or the
/// receive handler fails, so the collector can release the affinity entry.
pub trait WorkProcessor: Send + Sync {
    fn process(&self, item: WorkItem) -> Completion;
}

pub struct Worker {
    inbound: SpscRing<WorkItem>,
    outbound: SpscRing<Completion>,
    in_producer: Mutex<()>,
    out_producer: Mutex<()>,
    wake: WakeNotifier,
    stop: AtomicBool,
    running: AtomicBool,
    overflow_warned: AtomicBool,
    thread_id: Mutex<Option<ThreadId>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// `ring_capacity` is rounded up to a power of two by the rings.
    pub fn new(ring_capacity: usize) -> Self {
        Worker {
            inbound: SpscRing::with_capacity(ring_capacity),
            outbound: SpscRing::with_capacity(ring_capacity),
            in_producer: Mutex::new(()),
            out_producer: Mutex::new(()),
            wake: WakeNotifier::new(),
            stop: AtomicBool::new(false),
            running: AtomicBool::new(false),
            overflow_warned: AtomicBool::new(false),
            thread_id: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    /// Spawns the worker thread. Idempotent while a thread is attached.
    pub fn start(
        self: &Arc<Self>,
        index: usize,
        processor: Arc<dyn WorkProcessor>,
        out_wake: Arc<WakeNotifier>,
    ) -> Result<()> {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return Ok(());
        }
        self.stop.store(false, Ordering::Release);
        let me = Arc::clone(self);
        let joined = thread::Builder::new()
            .name(format!("tmx-worker-{index}"))
            .spawn(move || me.run(processor, out_wake))
            .map_err(Error::Spawn)?;
        // Running holds as soon as start() returns; the thread-exit store
        // remains the signal that the loop actually ended.
        self.running.store(true, Ordering::Release);
        *handle = Some(joined);
        Ok(())
    }

    /// Signals the loop to exit and joins the thread.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.wake.notify();
        let handle = self.handle.lock().take();
        if let Some(h) = handle {
            // A worker cannot join itself; the flag alone ends the loop.
            if h.thread().id() == thread::current().id() {
                return;
            }
            let _ = h.join();
            self.running.store(false, Ordering::Release);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn thread_id(&self) -> Option<ThreadId> {
        *self.thread_id.lock()
    }

    pub fn inbound_depth(&self) -> usize {
        self.inbound.len()
    }

    pub fn outbound_depth(&self) -> usize {
        self.outbound.len()
    }

    /// Admission check plus push. Rejects when the inbound depth has
    /// reached `overflow`, logging once per threshold crossing. Callable
    /// from any thread; concurrent admissions are serialized.
    pub fn try_admit(&self, item: WorkItem, overflow: usize) -> bool {
        let _guard = self.in_producer.lock();
        let depth = self.inbound.len();
        if overflow > 0 && depth >= overflow {
            if !self.overflow_warned.swap(true, Ordering::Relaxed) {
                log::warn!(
                    "[Worker] dropping messages: inbound depth {depth} at overflow capacity {overflow}"
                );
            }
            return false;
        }
        if self.overflow_warned.swap(false, Ordering::Relaxed) {
            log::info!("[Worker] inbound depth {depth} back under overflow capacity {overflow}");
        }
        match self.inbound.push(item) {
            Ok(()) => {
                self.wake.notify();
                true
            }
            Err(item) => {
                log::debug!(
                    "[Worker] message for {}/{} lost, inbound ring full",
                    item.group,
                    item.id
                );
                false
            }
        }
    }

    /// Pushes a completion onto the outbound ring. Used by the worker loop
    /// and by the deferred outgoing path.
    pub fn push_out(&self, completion: Completion) -> bool {
        let _guard = self.out_producer.lock();
        self.outbound.push(completion).is_ok()
    }

    /// Collector-side pop. Single consumer only.
    pub fn pop_completion(&self) -> Option<Completion> {
        self.outbound.pop()
    }

    fn run(self: Arc<Self>, processor: Arc<dyn WorkProcessor>, out_wake: Arc<WakeNotifier>) {
        *self.thread_id.lock() = Some(thread::current().id());
        log::debug!("[Worker] {} started", thread::current().name().unwrap_or("?"));
        while !self.stop.load(Ordering::Acquire) {
            match self.inbound.pop() {
                Some(item) => {
                    let (group, id) = (item.group, item.id);
                    let completion = processor.process(item);
                    if self.push_out(completion) {
                        out_wake.notify();
                    } else {
                        log::warn!(
                            "[Worker] completion for {group}/{id} lost, outbound ring full"
                        );
                    }
                }
                None => {
                    self.wake.wait_timeout(Duration::from_millis(IDLE_WAIT_MS));
                }
            }
        }
        self.running.store(false, Ordering::Release);
        log::debug!("[Worker] {} stopped", thread::current().name().unwrap_or("?"));
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}
