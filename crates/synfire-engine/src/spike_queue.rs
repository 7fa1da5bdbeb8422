// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bounded single-producer single-consumer spike queue.
//!
//! The producer is the spike-arrival interrupt, the consumer is the
//! scheduler continuation; with exactly one of each, atomic head/tail
//! indices are enough - no lock, no allocation.
//!
//! The `allocated()` / `unallocated()` slot-count helpers preserve the
//! legacy circular-buffer arithmetic (wrapping difference masked by
//! `capacity - 1`): the queue is "full" at `capacity - 1` stored spikes and
//! `unallocated()` reports `capacity` when empty. The exactly-full and
//! exactly-empty values are pinned by property tests rather than reworked.

use std::sync::atomic::{AtomicU64, AtomicU32, AtomicUsize, Ordering};
use synfire_core::types::SpikeKey;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue capacity must be a power of two >= 2, got {0}")]
    CapacityNotPowerOfTwo(usize),
}

#[derive(Debug)]
pub struct SpikeQueue {
    slots: Box<[AtomicU32]>,
    /// Consumer index; increments without bound, masked on access.
    head: AtomicUsize,
    /// Producer index; increments without bound, masked on access.
    tail: AtomicUsize,
    capacity: usize,
    overflows: AtomicU64,
}

impl SpikeQueue {
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity < 2 || !capacity.is_power_of_two() {
            return Err(QueueError::CapacityNotPowerOfTwo(capacity));
        }
        let slots = (0..capacity).map(|_| AtomicU32::new(0)).collect();
        Ok(Self {
            slots,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            capacity,
            overflows: AtomicU64::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently occupied (legacy masked-difference arithmetic).
    pub fn allocated(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        tail.wrapping_sub(head) & (self.capacity - 1)
    }

    /// Slots currently free as the legacy helper reported them:
    /// `capacity - allocated`, which reads `capacity` on an empty queue even
    /// though only `capacity - 1` spikes ever fit.
    pub fn unallocated(&self) -> usize {
        self.capacity - self.allocated()
    }

    pub fn is_empty(&self) -> bool {
        self.allocated() == 0
    }

    /// Producer side (interrupt context). Returns false and counts the
    /// overflow when the queue is full; the spike is dropped, never blocked
    /// on.
    pub fn push(&self, key: SpikeKey) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) & (self.capacity - 1) == self.capacity - 1 {
            self.overflows.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.slots[tail & (self.capacity - 1)].store(key.0, Ordering::Relaxed);
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    /// Consumer side (scheduler continuation).
    pub fn pop(&self) -> Option<SpikeKey> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let key = self.slots[head & (self.capacity - 1)].load(Ordering::Relaxed);
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(SpikeKey(key))
    }

    /// Drain everything still queued, returning how many spikes were
    /// discarded. Used by the drop-at-deadline policy; the caller counts.
    pub fn drain(&self) -> u64 {
        let mut dropped = 0;
        while self.pop().is_some() {
            dropped += 1;
        }
        dropped
    }

    /// Producer-side overflow count since construction.
    pub fn overflow_count(&self) -> u64 {
        self.overflows.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_capacities() {
        assert!(SpikeQueue::new(0).is_err());
        assert!(SpikeQueue::new(1).is_err());
        assert!(SpikeQueue::new(100).is_err());
        assert!(SpikeQueue::new(128).is_ok());
    }

    #[test]
    fn fifo_order() {
        let q = SpikeQueue::new(8).unwrap();
        for k in 0..5u32 {
            assert!(q.push(SpikeKey(k)));
        }
        for k in 0..5u32 {
            assert_eq!(q.pop(), Some(SpikeKey(k)));
        }
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn full_at_capacity_minus_one() {
        let q = SpikeQueue::new(8).unwrap();
        for k in 0..7u32 {
            assert!(q.push(SpikeKey(k)), "slot {k} should fit");
        }
        assert!(!q.push(SpikeKey(99)), "eighth spike must be rejected");
        assert_eq!(q.overflow_count(), 1);
        assert_eq!(q.allocated(), 7);
        assert_eq!(q.unallocated(), 1);
    }

    #[test]
    fn legacy_slot_counts_at_empty() {
        let q = SpikeQueue::new(16).unwrap();
        assert_eq!(q.allocated(), 0);
        // Legacy arithmetic reports the full capacity as unallocated even
        // though only capacity-1 spikes fit.
        assert_eq!(q.unallocated(), 16);
    }

    #[test]
    fn wraparound_preserves_order() {
        let q = SpikeQueue::new(4).unwrap();
        // Cycle enough times to wrap the masked indices repeatedly.
        for round in 0..40u32 {
            assert!(q.push(SpikeKey(round)));
            assert!(q.push(SpikeKey(round + 1000)));
            assert_eq!(q.pop(), Some(SpikeKey(round)));
            assert_eq!(q.pop(), Some(SpikeKey(round + 1000)));
        }
        assert!(q.is_empty());
    }

    #[test]
    fn drain_reports_discarded_count() {
        let q = SpikeQueue::new(8).unwrap();
        for k in 0..6u32 {
            q.push(SpikeKey(k));
        }
        assert_eq!(q.drain(), 6);
        assert!(q.is_empty());
    }
}
