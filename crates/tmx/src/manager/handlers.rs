// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Application-facing hooks: inbound delivery and outbound broadcast.

use crate::message::RoutedMessage;

/// Called on a worker thread for every routed inbound message.
///
/// Panics are contained by the caller; a panicking handler loses that one
/// message and the worker keeps running.
pub trait ReceiveHandler: Send + Sync {
    fn on_message_received(&self, msg: &RoutedMessage);
}

/// Accepts a serialized outgoing envelope for transmission.
///
/// Immediate sends invoke this on the caller's thread, deferred sends on
/// the output collector thread.
pub trait BroadcastSink: Send + Sync {
    fn broadcast(&self, serialized: &[u8]);
}

/// Adapts a closure into a [`ReceiveHandler`].
pub struct CallbackHandler<F: Fn(&RoutedMessage) + Send + Sync> {
    callback: F,
}

impl<F: Fn(&RoutedMessage) + Send + Sync> CallbackHandler<F> {
    pub fn new(callback: F) -> Self {
        CallbackHandler { callback }
    }
}

impl<F: Fn(&RoutedMessage) + Send + Sync> ReceiveHandler for CallbackHandler<F> {
    fn on_message_received(&self, msg: &RoutedMessage) {
        (self.callback)(msg);
    }
}

/// Adapts a closure into a [`BroadcastSink`].
pub struct CallbackSink<F: Fn(&[u8]) + Send + Sync> {
    callback: F,
}

impl<F: Fn(&[u8]) + Send + Sync> CallbackSink<F> {
    pub fn new(callback: F) -> Self {
        CallbackSink { callback }
    }
}

impl<F: Fn(&[u8]) + Send + Sync> BroadcastSink for CallbackSink<F> {
    fn broadcast(&self, serialized: &[u8]) {
        (self.callback)(serialized);
    }
}
