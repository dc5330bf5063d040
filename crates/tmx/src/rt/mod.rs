// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime primitives for the dispatch fabric.
//!
//! - [`spsc`]: lock-free single-producer single-consumer ring buffers, one
//!   pair per worker.
//! - [`wake`]: atomic fast-path + condvar idle/wake notification, used by
//!   workers and the output collector.

pub mod spsc;
pub mod wake;

pub use spsc::SpscRing;
pub use wake::WakeNotifier;
