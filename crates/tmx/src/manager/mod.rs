// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message manager: the routing front door tying the pool, the affinity
//! table, the codec registry and the output collector together.
//!
//! Inbound bytes enter through [`MessageManager::incoming`] (or the
//! string variant), get pinned to a worker by (group, id) affinity, and
//! are decoded and delivered to the receive handler on that worker's
//! thread. Outbound messages leave through [`MessageManager::outgoing`],
//! either broadcast on the spot or parked on a worker's completion ring
//! for the collector to flush.

mod handlers;

pub use handlers::{BroadcastSink, CallbackHandler, CallbackSink, ReceiveHandler};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Mutex, RwLock};

use crate::codec::DecoderRegistry;
use crate::config::{
    CFG_ASSIGNMENT_STRATEGY, CFG_OVERFLOW_CAPACITY, CFG_WORKER_THREADS, DEFAULT_ASSIGNMENT_STRATEGY,
    DEFAULT_OVERFLOW_CAPACITY, DEFAULT_RING_CAPACITY, DEFAULT_WORKER_THREADS, MAX_WORKER_THREADS,
};
use crate::dispatch::{
    AffinityTable, CompletionSink, OutputCollector, Strategy, WorkProcessor, Worker, WorkerPool,
};
use crate::error::{Error, Result};
use crate::message::{
    hex_decode, is_hex_encoded, Completion, RoutedMessage, WorkItem, ENCODING_BYTEARRAY,
    ENCODING_JSON, ENCODING_STRING,
};
use crate::rt::WakeNotifier;

struct Inner {
    name: String,
    pool: Arc<WorkerPool>,
    affinity: AffinityTable,
    registry: DecoderRegistry,
    out_wake: Arc<WakeNotifier>,
    overflow: AtomicUsize,
    worker_target: AtomicUsize,
    receive: RwLock<Option<Arc<dyn ReceiveHandler>>>,
    broadcast: RwLock<Option<Arc<dyn BroadcastSink>>>,
    drops: AtomicU64,
    next_out: AtomicUsize,
}

impl Inner {
    /// Decode chain: hex payloads go through the protocol registry with a
    /// raw fallback, json payloads through the envelope parser with a
    /// bare-value fallback, everything else is delivered as text.
    fn route(&self, item: WorkItem) -> Option<RoutedMessage> {
        let WorkItem {
            timestamp_ms,
            encoding,
            payload,
            ..
        } = item;
        if payload.is_empty() {
            return None;
        }
        let encoding = if encoding.is_empty() {
            ENCODING_STRING.to_string()
        } else {
            encoding
        };

        let mut routed = if is_hex_encoded(&encoding) {
            let decoded = if encoding == ENCODING_BYTEARRAY {
                None
            } else {
                self.registry.decode(&payload)
            };
            Some(decoded.unwrap_or_else(|| {
                log::debug!(
                    "[{}] payload not recognized by any decoder, keeping raw bytes",
                    self.name
                );
                RoutedMessage::raw(&encoding, payload)
            }))
        } else {
            let text = String::from_utf8(payload)
                .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
            if encoding.starts_with(ENCODING_JSON) {
                match serde_json::from_str::<serde_json::Value>(&text) {
                    Ok(value) => Some(match RoutedMessage::from_envelope(&value) {
                        Some(mut msg) => {
                            if msg.header.encoding.is_empty() {
                                msg.header.encoding = encoding.clone();
                            }
                            msg
                        }
                        None => {
                            log::debug!(
                                "[{}] no payload attribute, treating input as a bare JSON payload",
                                self.name
                            );
                            RoutedMessage::json(value)
                        }
                    }),
                    Err(e) => {
                        log::error!(
                            "[{}] failed to create message from incoming bytes: {e}",
                            self.name
                        );
                        None
                    }
                }
            } else {
                Some(RoutedMessage::text(&encoding, text))
            }
        };

        if let Some(msg) = routed.as_mut() {
            if timestamp_ms > 0 {
                msg.header.timestamp_ms = timestamp_ms;
            }
        }
        routed
    }

    fn deliver(&self, msg: &RoutedMessage) {
        let handler = self.receive.read().clone();
        if let Some(handler) = handler {
            if catch_unwind(AssertUnwindSafe(|| handler.on_message_received(msg))).is_err() {
                log::error!(
                    "[{}] receive handler panicked on a {} message",
                    self.name,
                    msg.header.msg_type
                );
            }
        }
    }
}

impl WorkProcessor for Inner {
    fn process(&self, item: WorkItem) -> Completion {
        let (group, id) = (item.group, item.id);
        if let Some(msg) = self.route(item) {
            self.deliver(&msg);
        }
        Completion {
            group,
            id,
            outgoing: None,
        }
    }
}

impl CompletionSink for Inner {
    fn on_completion(&self, completion: Completion) {
        if let Some(bytes) = &completion.outgoing {
            let sink = self.broadcast.read().clone();
            if let Some(sink) = sink {
                if catch_unwind(AssertUnwindSafe(|| sink.broadcast(bytes))).is_err() {
                    log::error!("[{}] broadcast sink panicked", self.name);
                }
            }
        }
        self.affinity.unassign(completion.group, completion.id);
    }
}

pub struct MessageManager {
    inner: Arc<Inner>,
    collector: Mutex<Option<OutputCollector>>,
}

impl MessageManager {
    pub fn new(name: &str) -> Self {
        Self::with_registry(name, DecoderRegistry::with_defaults())
    }

    /// Builds a manager with a caller-supplied decoder registry.
    pub fn with_registry(name: &str, registry: DecoderRegistry) -> Self {
        let strategy =
            Strategy::from_name(DEFAULT_ASSIGNMENT_STRATEGY).unwrap_or(Strategy::RoundRobin);
        MessageManager {
            inner: Arc::new(Inner {
                name: name.to_string(),
                pool: Arc::new(WorkerPool::new()),
                affinity: AffinityTable::new(strategy),
                registry,
                out_wake: WakeNotifier::shared(),
                overflow: AtomicUsize::new(DEFAULT_OVERFLOW_CAPACITY),
                worker_target: AtomicUsize::new(DEFAULT_WORKER_THREADS),
                receive: RwLock::new(None),
                broadcast: RwLock::new(None),
                drops: AtomicU64::new(0),
                next_out: AtomicUsize::new(0),
            }),
            collector: Mutex::new(None),
        }
    }

    pub fn set_receive_handler(&self, handler: Arc<dyn ReceiveHandler>) {
        *self.inner.receive.write() = Some(handler);
    }

    pub fn set_broadcast_sink(&self, sink: Arc<dyn BroadcastSink>) {
        *self.inner.broadcast.write() = Some(sink);
    }

    /// Grows the pool to the configured thread count, starts every worker
    /// and the output collector. Safe to call repeatedly; a later call
    /// after a thread-count increase starts just the new workers.
    pub fn start(&self) -> Result<()> {
        let inner = &self.inner;
        let target = inner
            .worker_target
            .load(Ordering::Acquire)
            .min(MAX_WORKER_THREADS);
        while inner.pool.len() < target {
            inner.pool.push_back(Arc::new(Worker::new(DEFAULT_RING_CAPACITY)));
        }
        let processor = Arc::clone(inner);
        let processor: Arc<dyn WorkProcessor> = processor;
        inner.pool.start_all(&processor, &inner.out_wake)?;

        let mut collector = self.collector.lock();
        if collector.is_none() {
            let sink = Arc::clone(inner);
            let sink: Arc<dyn CompletionSink> = sink;
            *collector = Some(OutputCollector::start(
                Arc::clone(&inner.pool),
                sink,
                Arc::clone(&inner.out_wake),
            )?);
            log::info!(
                "[{}] started with {} worker threads",
                inner.name,
                inner.pool.len()
            );
        }
        Ok(())
    }

    /// Stops workers first, then the collector, joining every thread.
    /// Items still queued are discarded.
    pub fn stop(&self) {
        self.inner.pool.stop_all();
        if let Some(mut collector) = self.collector.lock().take() {
            collector.stop();
        }
        log::info!("[{}] stopped", self.inner.name);
    }

    pub fn is_running(&self) -> bool {
        !self.inner.pool.is_empty()
            && self.inner.pool.is_running()
            && self.collector.lock().as_ref().is_some_and(|c| c.is_running())
    }

    /// Routes raw inbound bytes to a worker. Drops silently on
    /// backpressure or when no workers exist; see [`Self::try_incoming`]
    /// for the reporting variant.
    pub fn incoming(
        &self,
        bytes: &[u8],
        encoding: Option<&str>,
        group: u8,
        id: u8,
        timestamp_ms: u64,
    ) {
        let _ = self.try_incoming(bytes, encoding, group, id, timestamp_ms);
    }

    pub fn try_incoming(
        &self,
        bytes: &[u8],
        encoding: Option<&str>,
        group: u8,
        id: u8,
        timestamp_ms: u64,
    ) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let inner = &self.inner;
        let index = inner.affinity.assign(&inner.pool, group, id);
        if index < 0 {
            inner.drops.fetch_add(1, Ordering::Relaxed);
            log::debug!("[{}] no worker threads, dropping message", inner.name);
            return Err(Error::NoWorkers);
        }
        let item = WorkItem {
            group,
            id,
            timestamp_ms,
            encoding: encoding.unwrap_or_default().to_string(),
            payload: bytes.to_vec(),
        };
        // Indices never shrink, so a bound index always resolves.
        let Some(worker) = inner.pool.get(index as usize) else {
            inner.affinity.unassign(group, id);
            inner.drops.fetch_add(1, Ordering::Relaxed);
            return Err(Error::NoWorkers);
        };
        let overflow = inner.overflow.load(Ordering::Relaxed);
        if !worker.try_admit(item, overflow) {
            // The reference taken by assign must be released, the
            // completion that normally releases it will never come.
            inner.affinity.unassign(group, id);
            inner.drops.fetch_add(1, Ordering::Relaxed);
            return Err(Error::QueueFull);
        }
        Ok(())
    }

    /// String-input convenience: hex-looking encodings are decoded to
    /// bytes first, undecodable hex falls back to the literal characters.
    pub fn incoming_str(
        &self,
        contents: &str,
        encoding: Option<&str>,
        group: u8,
        id: u8,
        timestamp_ms: u64,
    ) {
        if encoding.map(is_hex_encoded).unwrap_or(false) {
            if let Some(bytes) = hex_decode(contents) {
                self.incoming(&bytes, encoding, group, id, timestamp_ms);
                return;
            }
            log::debug!(
                "[{}] hex decode failed, routing literal characters",
                self.inner.name
            );
        }
        self.incoming(contents.as_bytes(), encoding, group, id, timestamp_ms);
    }

    /// Sends a message out through the broadcast sink.
    ///
    /// With `immediate` the envelope is serialized and broadcast on the
    /// calling thread. Otherwise it is parked on a worker's completion
    /// ring, the caller's own worker when invoked from a pool thread,
    /// round-robin otherwise, and the collector broadcasts it in turn
    /// with already-finished work.
    pub fn outgoing(&self, msg: &RoutedMessage, immediate: bool) {
        let inner = &self.inner;
        let bytes = msg.to_json_bytes();
        if immediate {
            let sink = inner.broadcast.read().clone();
            if let Some(sink) = sink {
                sink.broadcast(&bytes);
            }
            return;
        }
        let n = inner.pool.len();
        if n == 0 {
            // No completion rings to park on, fall back to a direct send.
            let sink = inner.broadcast.read().clone();
            if let Some(sink) = sink {
                sink.broadcast(&bytes);
            }
            return;
        }
        let index = inner
            .pool
            .locate(thread::current().id())
            .unwrap_or_else(|| inner.next_out.fetch_add(1, Ordering::Relaxed) % n);
        let completion = Completion {
            group: 0,
            id: 0,
            outgoing: Some(bytes),
        };
        match inner.pool.get(index) {
            Some(worker) if worker.push_out(completion) => inner.out_wake.notify(),
            _ => log::warn!("[{}] outgoing message lost, completion ring full", inner.name),
        }
    }

    /// Applies a runtime configuration change. Returns true when the key
    /// is recognized.
    ///
    /// `WorkerThreads` only ever grows the pool, shrink requests are
    /// ignored; values above the hard cap are rejected.
    pub fn on_config_changed(&self, key: &str, value: &str) -> bool {
        let inner = &self.inner;
        match key {
            CFG_WORKER_THREADS => {
                match value.parse::<usize>() {
                    Ok(n) if n > inner.pool.len() && n <= MAX_WORKER_THREADS => {
                        inner.worker_target.store(n, Ordering::Release);
                        let started = self.collector.lock().is_some();
                        if started {
                            if let Err(e) = self.start() {
                                log::error!("[{}] failed to grow worker pool: {e}", inner.name);
                            }
                        }
                    }
                    Ok(n) => {
                        log::debug!(
                            "[{}] ignoring {CFG_WORKER_THREADS}={n}, pool has {} workers (max {})",
                            inner.name,
                            inner.pool.len(),
                            MAX_WORKER_THREADS
                        );
                    }
                    Err(e) => {
                        log::warn!("[{}] bad {CFG_WORKER_THREADS} value {value:?}: {e}", inner.name);
                    }
                }
                true
            }
            CFG_ASSIGNMENT_STRATEGY => {
                inner.affinity.set_strategy(value);
                true
            }
            CFG_OVERFLOW_CAPACITY => {
                match value.parse::<usize>() {
                    Ok(n) => inner.overflow.store(n, Ordering::Relaxed),
                    Err(e) => {
                        log::warn!(
                            "[{}] bad {CFG_OVERFLOW_CAPACITY} value {value:?}: {e}",
                            inner.name
                        );
                    }
                }
                true
            }
            _ => false,
        }
    }

    /// Messages dropped at admission since construction.
    pub fn drop_count(&self) -> u64 {
        self.inner.drops.load(Ordering::Relaxed)
    }

    pub fn num_workers(&self) -> usize {
        self.inner.pool.len()
    }

    /// In-flight items pinned to a (group, id) key.
    pub fn inflight(&self, group: u8, id: u8) -> u64 {
        self.inner.affinity.refcount(group, id)
    }
}

impl Drop for MessageManager {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_without_workers_reports_and_counts() {
        let mgr = MessageManager::new("test");
        assert!(matches!(
            mgr.try_incoming(b"hello", None, 1, 1, 0),
            Err(Error::NoWorkers)
        ));
        assert_eq!(mgr.drop_count(), 1);
        // silent variant drops without error
        mgr.incoming(b"hello", None, 1, 1, 0);
        assert_eq!(mgr.drop_count(), 2);
    }

    #[test]
    fn empty_payload_is_accepted_and_ignored() {
        let mgr = MessageManager::new("test");
        assert!(mgr.try_incoming(b"", None, 1, 1, 0).is_ok());
        assert_eq!(mgr.drop_count(), 0);
        assert_eq!(mgr.inflight(1, 1), 0);
    }

    #[test]
    fn config_keys_are_recognized() {
        let mgr = MessageManager::new("test");
        assert!(mgr.on_config_changed(CFG_ASSIGNMENT_STRATEGY, "Random"));
        assert!(mgr.on_config_changed(CFG_OVERFLOW_CAPACITY, "5"));
        assert!(mgr.on_config_changed(CFG_WORKER_THREADS, "8"));
        assert!(!mgr.on_config_changed("SomethingElse", "1"));
    }

    #[test]
    fn worker_threads_over_cap_is_ignored() {
        let mgr = MessageManager::new("test");
        assert!(mgr.on_config_changed(CFG_WORKER_THREADS, "100000"));
        mgr.start().unwrap();
        assert_eq!(mgr.num_workers(), DEFAULT_WORKER_THREADS);
        mgr.stop();
    }

    #[test]
    fn route_decodes_json_envelope() {
        let mgr = MessageManager::new("test");
        let item = WorkItem {
            group: 0,
            id: 0,
            timestamp_ms: 42,
            encoding: ENCODING_JSON.to_string(),
            payload: br#"{"header":{"type":"Custom","subtype":"x","encoding":"json"},"payload":{"k":1}}"#
                .to_vec(),
        };
        let msg = mgr.inner.route(item).unwrap();
        assert_eq!(msg.header.msg_type, "Custom");
        assert_eq!(msg.header.timestamp_ms, 42);
    }

    #[test]
    fn route_falls_back_to_bare_json() {
        let mgr = MessageManager::new("test");
        let item = WorkItem {
            group: 0,
            id: 0,
            timestamp_ms: 0,
            encoding: ENCODING_JSON.to_string(),
            payload: br#"{"speed":12.5}"#.to_vec(),
        };
        let msg = mgr.inner.route(item).unwrap();
        assert!(matches!(msg.payload, crate::message::Payload::Json(_)));
    }

    #[test]
    fn route_rejects_malformed_json() {
        let mgr = MessageManager::new("test");
        let item = WorkItem {
            group: 0,
            id: 0,
            timestamp_ms: 0,
            encoding: ENCODING_JSON.to_string(),
            payload: b"{not json".to_vec(),
        };
        assert!(mgr.inner.route(item).is_none());
    }

    #[test]
    fn route_keeps_unrecognized_hex_as_raw() {
        let mgr = MessageManager::new("test");
        let item = WorkItem {
            group: 0,
            id: 0,
            timestamp_ms: 0,
            encoding: crate::message::ENCODING_ASN1_UPER.to_string(),
            payload: vec![0xff],
        };
        let msg = mgr.inner.route(item).unwrap();
        assert_eq!(msg.header.msg_type, crate::message::TYPE_UNKNOWN);
        assert!(matches!(msg.payload, crate::message::Payload::Raw(_)));
    }

    #[test]
    fn bytearray_encoding_bypasses_decoders() {
        let mgr = MessageManager::new("test");
        // a valid J2735 frame, but the caller said plain bytes
        let item = WorkItem {
            group: 0,
            id: 0,
            timestamp_ms: 0,
            encoding: ENCODING_BYTEARRAY.to_string(),
            payload: vec![0x00, 0x14, 0x25, 0x1d],
        };
        let msg = mgr.inner.route(item).unwrap();
        assert!(matches!(msg.payload, crate::message::Payload::Raw(_)));
    }
}
