// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for fabric operations.
//!
//! Per-item failures (decode errors, handler panics) are logged and swallowed
//! at the worker-loop boundary and never surface here. Only admission results
//! and thread spawn failures are reported as errors.

use std::fmt;
use std::io;

/// Result type for fabric operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the dispatch fabric.
#[derive(Debug)]
pub enum Error {
    /// Failed to spawn an OS thread at start. Fatal, propagated to the caller.
    Spawn(io::Error),

    /// No workers configured; the item cannot be assigned.
    NoWorkers,

    /// The assigned worker rejected the item (overflow threshold or ring full).
    QueueFull,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Spawn(e) => write!(f, "failed to spawn worker thread: {}", e),
            Error::NoWorkers => write!(f, "no workers configured"),
            Error::QueueFull => write!(f, "worker queue full, item dropped"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Spawn(e) => Some(e),
            _ => None,
        }
    }
}
