// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Delay-indexed synaptic input accumulator.
//!
//! One `u16` slot per `(delay, synapse type, neuron index)` combination.
//! Additions saturate at `u16::MAX` (clamped, never wrapped) and every
//! saturation is counted for provenance. The front slice for the current
//! timestep is contiguous, so the hand-off to the neuron stage is a single
//! copy-and-clear.

use crate::types::RowGeometry;

/// Saturating accumulator array of size `2^(delay_bits + type_index_bits)`.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    geometry: RowGeometry,
    slots: Vec<u16>,
    saturations: u64,
}

impl RingBuffer {
    /// Allocate all slots once; the buffer never grows afterwards.
    pub fn new(geometry: RowGeometry) -> Self {
        Self {
            geometry,
            slots: vec![0; geometry.ring_slots()],
            saturations: 0,
        }
    }

    pub fn geometry(&self) -> &RowGeometry {
        &self.geometry
    }

    /// Number of entries in the per-timestep front slice.
    pub fn slice_len(&self) -> usize {
        self.geometry.slice_len()
    }

    /// Saturating add into one slot. Returns true if the value clamped.
    pub fn add(&mut self, offset: usize, weight: u16) -> bool {
        debug_assert!(offset < self.slots.len(), "ring offset out of range");
        let slot = &mut self.slots[offset];
        let (sum, overflowed) = slot.overflowing_add(weight);
        if overflowed {
            *slot = u16::MAX;
            self.saturations += 1;
        } else {
            *slot = sum;
        }
        overflowed
    }

    /// Current value of one slot (test and diagnostic use).
    pub fn get(&self, offset: usize) -> u16 {
        self.slots[offset]
    }

    /// Copy the front slice for timestep `time` into `out` and clear it.
    ///
    /// The slice must be cleared in the same step it is read: the neuron
    /// stage consumes each slot exactly once per timestep.
    pub fn drain_front_slice(&mut self, time: u32, out: &mut [u16]) {
        let base = ((time & self.geometry.delay_mask()) as usize) << self.geometry.type_index_bits();
        let slice = &mut self.slots[base..base + self.geometry.slice_len()];
        debug_assert_eq!(out.len(), slice.len(), "slice length mismatch");
        out.copy_from_slice(slice);
        slice.fill(0);
    }

    /// Number of saturating additions seen so far.
    pub fn saturation_count(&self) -> u64 {
        self.saturations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::codec::ring_buffer_offset;

    fn geometry() -> RowGeometry {
        // delay_bits=4, type_index_bits=4 per the saturation scenario.
        RowGeometry::new(4, 1, 3).unwrap()
    }

    #[test]
    fn accumulation_saturates_instead_of_wrapping() {
        let mut ring = RingBuffer::new(geometry());
        let offset = 3;
        assert!(!ring.add(offset, 60_000));
        assert!(ring.add(offset, 10_000));
        assert_eq!(ring.get(offset), u16::MAX, "must clamp, not wrap to 4465");
        assert_eq!(ring.saturation_count(), 1);
    }

    #[test]
    fn accumulation_is_commutative_up_to_saturation() {
        let weights = [400u16, 9_000, 60_000, 1, 700];
        let mut forward = RingBuffer::new(geometry());
        let mut reverse = RingBuffer::new(geometry());
        for &w in &weights {
            forward.add(7, w);
        }
        for &w in weights.iter().rev() {
            reverse.add(7, w);
        }
        assert_eq!(forward.get(7), reverse.get(7));
        let clamped: u32 = weights.iter().map(|&w| w as u32).sum();
        assert_eq!(forward.get(7) as u32, clamped.min(u16::MAX as u32));
    }

    #[test]
    fn drain_clears_only_the_front_slice() {
        let g = geometry();
        let mut ring = RingBuffer::new(g);
        let now = ring_buffer_offset(&g, 0, 5, 1, 2);
        let later = ring_buffer_offset(&g, 3, 5, 1, 2);
        ring.add(now, 11);
        ring.add(later, 22);

        let mut out = vec![0u16; ring.slice_len()];
        ring.drain_front_slice(5, &mut out);
        assert_eq!(out.iter().map(|&v| v as u32).sum::<u32>(), 11);
        assert_eq!(ring.get(now), 0, "front slice cleared after transfer");
        assert_eq!(ring.get(later), 22, "future delay slots untouched");
    }
}
