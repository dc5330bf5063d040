// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # TMX - Transport Message eXchange dispatch fabric
//!
//! An in-process message routing and worker dispatch core for V2X-hub style
//! plugin systems. Raw byte payloads (J2735/ASN.1, RTCM, JSON, plain strings)
//! arrive from an external bus, are decoded into typed messages on a fixed
//! pool of worker threads with sticky (group, id) affinity, and completions
//! are recombined on a single output thread for broadcast.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tmx::{CallbackHandler, CallbackSink, MessageManager, Result};
//!
//! fn main() -> Result<()> {
//!     let manager = MessageManager::new("demo");
//!
//!     manager.set_receive_handler(Arc::new(CallbackHandler::new(|msg| {
//!         println!("received {}", msg.header.msg_type);
//!     })));
//!     manager.set_broadcast_sink(Arc::new(CallbackSink::new(|bytes| {
//!         println!("broadcast {} bytes", bytes.len());
//!     })));
//!
//!     manager.start()?;
//!
//!     // Feed a hex-encoded ASN.1 payload for stream (group=1, id=1)
//!     manager.incoming_str("0014251d59", Some(tmx::message::ENCODING_ASN1_UPER), 1, 1, 0);
//!
//!     manager.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                         Producer threads                           |
//! |   incoming(bytes, enc, group, id, ts)  -> admission + assignment   |
//! +--------------------------------------------------------------------+
//! |  AffinityTable (256x256 refcounted (group,id) -> worker binding)   |
//! +--------------------------------------------------------------------+
//! |  WorkerPool: N workers, each with SPSC inbound/outbound ring pair  |
//! |  Worker loop: pop -> decode -> receive handler -> completion       |
//! +--------------------------------------------------------------------+
//! |  OutputCollector: single thread draining all outbound rings,       |
//! |  broadcast hook + affinity release                                 |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`MessageManager`] | Entry point: admission, decode dispatch, broadcast |
//! | [`RoutedMessage`] | Decoded message (typed, raw bytes, text or JSON) |
//! | [`ReceiveHandler`] | Callback invoked once per decoded message |
//! | [`BroadcastSink`] | Accepts serialized messages for transmission |
//! | [`Strategy`] | Worker assignment strategy (round-robin, random, shortest-queue) |
//!
//! ## Modules Overview
//!
//! - [`manager`] - Message manager / router core (start here)
//! - [`dispatch`] - Worker pool, affinity table, output collector
//! - [`codec`] - Protocol decoder registry (J2735 revisions, RTCM)
//! - [`message`] - Message model, encoding tags, hex codec
//! - [`rt`] - SPSC rings and the idle/wake notifier

/// Protocol decoder registry (J2735 revision recognizers, RTCM preamble).
pub mod codec;
/// Defaults and configuration key constants.
pub mod config;
/// Worker pool, affinity assignment and output collection.
pub mod dispatch;
/// Error types for fabric operations.
pub mod error;
/// Message manager: admission, decode dispatch and broadcast.
pub mod manager;
/// Message model: encoding tags, work items, routed messages.
pub mod message;
/// Runtime primitives: SPSC rings and wake notification.
pub mod rt;

pub use codec::{DecoderRegistry, ProtocolDecoder};
pub use dispatch::{AffinityTable, OutputCollector, Strategy, Worker, WorkerPool};
pub use error::{Error, Result};
pub use manager::{
    BroadcastSink, CallbackHandler, CallbackSink, MessageManager, ReceiveHandler,
};
pub use message::{Completion, MessageHeader, Payload, RoutedMessage, WorkItem};
