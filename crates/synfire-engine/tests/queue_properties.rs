// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Property tests pinning the spike queue's legacy slot-count arithmetic.
//!
//! `allocated()` and `unallocated()` keep the historical circular-buffer
//! semantics (full at capacity-1, `unallocated() == capacity` when empty);
//! these properties are the contract, exercised across arbitrary push/pop
//! interleavings.

use proptest::prelude::*;
use synfire_core::types::SpikeKey;
use synfire_engine::SpikeQueue;

#[derive(Debug, Clone, Copy)]
enum Op {
    Push(u32),
    Pop,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![any::<u32>().prop_map(Op::Push), Just(Op::Pop)]
}

proptest! {
    #[test]
    fn slot_counts_stay_consistent(
        capacity_log in 1u32..8,
        ops in prop::collection::vec(op_strategy(), 0..200),
    ) {
        let capacity = 1usize << capacity_log;
        let queue = SpikeQueue::new(capacity).unwrap();
        let mut model: std::collections::VecDeque<u32> = Default::default();

        for op in ops {
            match op {
                Op::Push(key) => {
                    let accepted = queue.push(SpikeKey(key));
                    // Full at capacity-1 stored spikes, never earlier.
                    prop_assert_eq!(accepted, model.len() < capacity - 1);
                    if accepted {
                        model.push_back(key);
                    }
                }
                Op::Pop => {
                    let got = queue.pop().map(|k| k.0);
                    prop_assert_eq!(got, model.pop_front());
                }
            }
            // The legacy helpers always partition the capacity.
            prop_assert_eq!(queue.allocated(), model.len());
            prop_assert_eq!(queue.unallocated(), capacity - model.len());
            prop_assert_eq!(queue.allocated() + queue.unallocated(), capacity);
        }
    }

    #[test]
    fn overflow_count_matches_rejections(
        keys in prop::collection::vec(any::<u32>(), 0..300),
    ) {
        let queue = SpikeQueue::new(64).unwrap();
        let rejected = keys
            .iter()
            .filter(|&&k| !queue.push(SpikeKey(k)))
            .count() as u64;
        prop_assert_eq!(queue.overflow_count(), rejected);
        // Exactly capacity-1 spikes fit before the first rejection.
        prop_assert_eq!(queue.allocated(), keys.len().min(63));
    }

    #[test]
    fn fifo_order_survives_wraparound(
        rounds in prop::collection::vec(any::<u32>(), 1..100),
    ) {
        // Small queue forces the masked indices around many times.
        let queue = SpikeQueue::new(4).unwrap();
        for (i, key) in rounds.iter().enumerate() {
            prop_assert!(queue.push(SpikeKey(*key)));
            prop_assert!(queue.push(SpikeKey(i as u32)));
            prop_assert_eq!(queue.pop(), Some(SpikeKey(*key)));
            prop_assert_eq!(queue.pop(), Some(SpikeKey(i as u32)));
        }
        prop_assert!(queue.is_empty());
    }
}
