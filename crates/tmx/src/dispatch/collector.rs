// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single output thread draining worker completion rings.
//!
//! The collector sweeps every worker in pool order, popping at most one
//! completion per worker per pass, and repeats until a pass drains
//! nothing. That keeps completions from busy workers interleaved instead
//! of letting one worker starve the rest. Between bursts it parks on a
//! shared [`WakeNotifier`] with a bounded wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::IDLE_WAIT_MS;
use crate::error::{Error, Result};
use crate::message::Completion;
use crate::rt::WakeNotifier;

use super::pool::WorkerPool;

/// Receives every drained completion on the collector thread.
pub trait CompletionSink: Send + Sync {
    fn on_completion(&self, completion: Completion);
}

pub struct OutputCollector {
    stop: Arc<AtomicBool>,
    wake: Arc<WakeNotifier>,
    handle: Option<JoinHandle<()>>,
}

impl OutputCollector {
    /// Spawns the collector thread over `pool`, feeding `sink`.
    pub fn start(
        pool: Arc<WorkerPool>,
        sink: Arc<dyn CompletionSink>,
        wake: Arc<WakeNotifier>,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread_wake = Arc::clone(&wake);
        let handle = thread::Builder::new()
            .name("tmx-output".into())
            .spawn(move || collector_loop(pool, sink, thread_stop, thread_wake))
            .map_err(Error::Spawn)?;
        log::debug!("[Collector] output thread started");
        Ok(OutputCollector {
            stop,
            wake,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some() && !self.stop.load(Ordering::Acquire)
    }

    /// Signals the loop to exit and joins it. Completions still queued on
    /// worker rings at this point are discarded with those rings.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.wake.notify();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            log::debug!("[Collector] output thread stopped");
        }
    }
}

impl Drop for OutputCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn collector_loop(
    pool: Arc<WorkerPool>,
    sink: Arc<dyn CompletionSink>,
    stop: Arc<AtomicBool>,
    wake: Arc<WakeNotifier>,
) {
    while !stop.load(Ordering::Acquire) {
        loop {
            let mut drained = false;
            for worker in pool.snapshot().iter() {
                if let Some(completion) = worker.pop_completion() {
                    sink.on_completion(completion);
                    drained = true;
                }
            }
            if !drained {
                break;
            }
        }
        wake.wait_timeout(Duration::from_millis(IDLE_WAIT_MS));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Instant;

    use super::super::worker::Worker;
    use super::*;

    struct Recorder {
        seen: Mutex<Vec<(u8, u8)>>,
    }

    impl CompletionSink for Recorder {
        fn on_completion(&self, completion: Completion) {
            self.seen.lock().unwrap().push((completion.group, completion.id));
        }
    }

    #[test]
    fn drains_completions_from_every_worker() {
        let pool = Arc::new(WorkerPool::new());
        for _ in 0..2 {
            pool.push_back(Arc::new(Worker::new(8)));
        }
        let sink = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let wake = WakeNotifier::shared();
        let mut collector =
            OutputCollector::start(Arc::clone(&pool), sink.clone(), Arc::clone(&wake)).unwrap();
        assert!(collector.is_running());

        for id in 0..4u8 {
            let worker = pool.get(usize::from(id % 2)).unwrap();
            assert!(worker.push_out(Completion {
                group: 1,
                id,
                outgoing: None,
            }));
        }
        wake.notify();

        let deadline = Instant::now() + Duration::from_secs(2);
        while sink.seen.lock().unwrap().len() < 4 {
            assert!(Instant::now() < deadline, "collector never drained");
            thread::sleep(Duration::from_millis(1));
        }
        collector.stop();
        assert!(!collector.is_running());

        let mut seen = sink.seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![(1, 0), (1, 1), (1, 2), (1, 3)]);
    }
}
