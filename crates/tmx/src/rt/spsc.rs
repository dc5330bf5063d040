// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-producer single-consumer (SPSC) ring buffer for work items.
//!
//! Lock-free ring buffer using atomic head/tail pointers. Each worker owns
//! one inbound ring (producer: the admitting thread, consumer: the worker)
//! and one outbound ring (producer: the worker, consumer: the output
//! collector). Push never blocks; a full ring hands the item back so the
//! caller can treat it as a backpressure signal.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Single-producer, single-consumer atomic ring buffer.
///
/// Protocol:
/// - Producer: push() writes at head, then advances head
/// - Consumer: pop() takes at tail, then advances tail
/// - Full: (head + 1) % capacity == tail (one slot stays reserved)
/// - Empty: head == tail
///
/// SAFETY:
/// - SPSC constraint: only ONE thread calls push(), ONE calls pop()
/// - Acquire/Release ordering ensures proper sync between producer/consumer
/// - Capacity is power of 2 (mask-based wrapping, no modulo)
/// - Uses UnsafeCell for interior mutability with atomic protection
pub struct SpscRing<T> {
    // Fixed-size ring buffer (power of 2 capacity)
    slots: Box<[UnsafeCell<Option<T>>]>,
    capacity_mask: usize,

    // Head pointer (producer advances)
    head: AtomicUsize,

    // Tail pointer (consumer advances)
    tail: AtomicUsize,
}

// SAFETY: SpscRing is Send + Sync because:
// - slots are protected by atomic head/tail (SPSC protocol)
// - only one thread writes (producer), one thread reads (consumer)
// - atomics ensure proper synchronization
unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T> SpscRing<T> {
    /// Create a new ring with capacity (rounded up to the next power of 2).
    ///
    /// # Panics
    /// Panics if capacity is 0.
    pub fn with_capacity(n: usize) -> Self {
        assert!(n > 0, "Capacity must be > 0");

        // Round up to next power of 2 for efficient masking
        let capacity = n.next_power_of_two();
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(None))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            capacity_mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Push an item (non-blocking).
    ///
    /// SAFETY:
    /// - Only ONE thread (producer) may call this function
    /// - Acquire ordering on tail ensures we see the consumer's updates
    /// - Release ordering on head ensures the consumer sees our write
    ///
    /// # Errors
    /// Returns the item back when the ring is full so the caller can log
    /// or drop it explicitly.
    pub fn push(&self, item: T) -> std::result::Result<(), T> {
        // Load current head (Relaxed: no sync needed, we're the only producer)
        let head = self.head.load(Ordering::Relaxed);
        let next_head = (head + 1) & self.capacity_mask;

        // Check if ring full (Acquire: sync with consumer's tail advance)
        let tail = self.tail.load(Ordering::Acquire);
        if next_head == tail {
            return Err(item); // Full, non-blocking
        }

        // SAFETY: SPSC protocol ensures only the producer writes at head
        unsafe {
            *self.slots[head].get() = Some(item);
        }

        // Advance head (Release: sync with consumer, slot now visible)
        self.head.store(next_head, Ordering::Release);

        Ok(())
    }

    /// Pop the next item (non-blocking, returns None if empty).
    ///
    /// SAFETY:
    /// - Only ONE thread (consumer) may call this function
    /// - Acquire ordering on head ensures we see the producer's writes
    /// - Release ordering on tail ensures the producer sees the freed slot
    pub fn pop(&self) -> Option<T> {
        // Load current tail (Relaxed: no sync needed, we're the only consumer)
        let tail = self.tail.load(Ordering::Relaxed);

        // Check if ring empty (Acquire: sync with producer's head advance)
        let head = self.head.load(Ordering::Acquire);
        if tail == head {
            return None; // Empty
        }

        // SAFETY: SPSC protocol ensures only the consumer reads at tail
        let item = unsafe { (*self.slots[tail].get()).take() };

        // Advance tail (Release: sync with producer, slot now free)
        let next_tail = (tail + 1) & self.capacity_mask;
        self.tail.store(next_tail, Ordering::Release);

        item
    }

    /// Current number of queued items (approximate, safe to call from any
    /// thread; used for overflow admission and shortest-queue scans).
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        (head.wrapping_sub(tail)) & self.capacity_mask
    }

    /// Check if the ring is empty (approximate).
    pub fn is_empty(&self) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        head == tail
    }

    /// Usable capacity (one slot is reserved by the full/empty protocol).
    pub fn capacity(&self) -> usize {
        self.capacity_mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_basic() {
        let ring = SpscRing::with_capacity(16);

        assert!(ring.push(String::from("alpha")).is_ok());

        let popped = ring.pop().expect("Pop should succeed after push");
        assert_eq!(popped, "alpha");
    }

    #[test]
    fn test_empty_ring() {
        let ring: SpscRing<u32> = SpscRing::with_capacity(8);
        assert!(ring.is_empty());
        assert!(ring.pop().is_none());
    }

    #[test]
    fn test_full_ring_returns_item() {
        let ring = SpscRing::with_capacity(4);

        // Push 3 entries (capacity - 1, because one slot reserved)
        for i in 0..3u32 {
            assert!(ring.push(i).is_ok(), "Failed to push entry {}", i);
        }

        // Next push should fail and hand the item back
        assert_eq!(ring.push(99), Err(99));
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn test_push_pop_sequence() {
        let ring = SpscRing::with_capacity(8);

        for i in 0..5u32 {
            assert!(ring.push(i).is_ok());
        }

        // Pop all 5 entries in FIFO order
        for i in 0..5u32 {
            let popped = ring.pop().expect("Pop should succeed for pushed entries");
            assert_eq!(popped, i);
        }

        assert!(ring.pop().is_none());
        assert!(ring.is_empty());
    }

    #[test]
    fn test_wraparound() {
        let ring = SpscRing::with_capacity(4);

        // Fill ring (3 entries, since 1 slot reserved)
        for i in 0..3u32 {
            assert!(ring.push(i).is_ok());
        }
        for _ in 0..3 {
            ring.pop().expect("Pop should succeed for pushed entries");
        }

        // Push again (should wrap around)
        for i in 10..13u32 {
            assert!(ring.push(i).is_ok());
        }
        for i in 10..13u32 {
            let popped = ring.pop().expect("Pop should succeed for pushed entries");
            assert_eq!(popped, i);
        }
    }

    #[test]
    fn test_capacity_power_of_two() {
        let ring: SpscRing<u8> = SpscRing::with_capacity(10); // Rounds up to 16
        assert_eq!(ring.capacity(), 15);

        let ring2: SpscRing<u8> = SpscRing::with_capacity(8);
        assert_eq!(ring2.capacity(), 7);
    }

    #[test]
    fn test_cross_thread_fifo() {
        use std::sync::Arc;
        use std::thread;

        let ring = Arc::new(SpscRing::with_capacity(256));
        let producer_ring = Arc::clone(&ring);

        let producer = thread::spawn(move || {
            for i in 0..10_000u32 {
                while producer_ring.push(i).is_err() {
                    std::hint::spin_loop();
                }
            }
        });

        let mut expected = 0u32;
        while expected < 10_000 {
            if let Some(v) = ring.pop() {
                assert_eq!(v, expected);
                expected += 1;
            } else {
                std::hint::spin_loop();
            }
        }

        producer.join().expect("producer thread panicked");
    }
}
