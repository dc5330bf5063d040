// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Worker dispatch: the pool of decode workers, the sticky (group, id)
//! affinity table, and the single output collector thread.
//!
//! Data flow: admission picks a worker through [`AffinityTable::assign`],
//! the item crosses that worker's inbound ring, the worker's processor
//! turns it into a [`crate::message::Completion`] on the outbound ring, and
//! the [`OutputCollector`] drains completions, fires the broadcast hook and
//! releases the affinity entry.

pub mod affinity;
pub mod collector;
pub mod pool;
pub mod worker;

pub use affinity::{AffinityTable, Strategy};
pub use collector::{CompletionSink, OutputCollector};
pub use pool::WorkerPool;
pub use worker::{WorkProcessor, Worker};
