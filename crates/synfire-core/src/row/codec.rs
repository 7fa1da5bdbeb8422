// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bit-packed synapse word encode/decode.
//!
//! The shift/mask accessors here are the single source of truth for the
//! persisted layout; they are unit-tested against exact words so a layout
//! change is caught immediately.

use crate::types::RowGeometry;

/// A decoded fixed-synapse word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSynapse {
    pub weight: u16,
    pub delay: u32,
    pub synapse_type: u32,
    pub index: u32,
}

impl FixedSynapse {
    /// Decode a packed 32-bit fixed-synapse word.
    #[inline]
    pub fn decode(word: u32, geometry: &RowGeometry) -> Self {
        Self {
            weight: (word >> 16) as u16,
            delay: (word >> geometry.type_index_bits()) & geometry.delay_mask(),
            synapse_type: (word >> geometry.index_bits()) & geometry.type_mask(),
            index: word & geometry.index_mask(),
        }
    }

    /// Encode to the packed word; exact inverse of [`FixedSynapse::decode`].
    #[inline]
    pub fn encode(&self, geometry: &RowGeometry) -> u32 {
        (self.weight as u32) << 16
            | (self.delay & geometry.delay_mask()) << geometry.type_index_bits()
            | (self.synapse_type & geometry.type_mask()) << geometry.index_bits()
            | (self.index & geometry.index_mask())
    }
}

/// A decoded plastic-region control half-word: the fixed-synapse layout
/// minus the weight, which instead lives in the plastic half-word array and
/// evolves through the plasticity engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlWord {
    pub delay: u32,
    pub synapse_type: u32,
    pub index: u32,
}

impl ControlWord {
    #[inline]
    pub fn decode(half: u16, geometry: &RowGeometry) -> Self {
        let half = half as u32;
        Self {
            delay: (half >> geometry.type_index_bits()) & geometry.delay_mask(),
            synapse_type: (half >> geometry.index_bits()) & geometry.type_mask(),
            index: half & geometry.index_mask(),
        }
    }

    #[inline]
    pub fn encode(&self, geometry: &RowGeometry) -> u16 {
        ((self.delay & geometry.delay_mask()) << geometry.type_index_bits()
            | (self.synapse_type & geometry.type_mask()) << geometry.index_bits()
            | (self.index & geometry.index_mask())) as u16
    }
}

/// Ring-buffer slot for a synapse landing `delay` timesteps after `time`.
///
/// `((delay + time) mod max_delay) << type_index_bits | type << index_bits |
/// index`, exactly the arrival-slot arithmetic the neuron stage unwinds.
#[inline]
pub fn ring_buffer_offset(
    geometry: &RowGeometry,
    delay: u32,
    time: u32,
    synapse_type: u32,
    index: u32,
) -> usize {
    ((((delay + time) & geometry.delay_mask()) << geometry.type_index_bits())
        | (synapse_type & geometry.type_mask()) << geometry.index_bits()
        | (index & geometry.index_mask())) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> RowGeometry {
        RowGeometry::new(4, 1, 8).unwrap()
    }

    #[test]
    fn fixed_word_round_trip_is_exact() {
        let g = geometry();
        let original = FixedSynapse {
            weight: 0xBEEF,
            delay: 13,
            synapse_type: 1,
            index: 201,
        };
        let word = original.encode(&g);
        assert_eq!(FixedSynapse::decode(word, &g), original);
    }

    #[test]
    fn fixed_word_exact_layout() {
        let g = geometry();
        // weight=1 delay=2 type=1 index=3 with 1 type bit and 8 index bits:
        // 0x0001 << 16 | 2 << 9 | 1 << 8 | 3
        let synapse = FixedSynapse {
            weight: 1,
            delay: 2,
            synapse_type: 1,
            index: 3,
        };
        assert_eq!(synapse.encode(&g), 0x0001_0503);
    }

    #[test]
    fn control_word_round_trip() {
        let g = geometry();
        for delay in [0u32, 1, 7, 15] {
            for index in [0u32, 128, 255] {
                let original = ControlWord {
                    delay,
                    synapse_type: 1,
                    index,
                };
                assert_eq!(ControlWord::decode(original.encode(&g), &g), original);
            }
        }
    }

    #[test]
    fn ring_offset_wraps_delay_modulo() {
        let g = geometry();
        // delay 10 at time 9 wraps to slot (10 + 9) mod 16 = 3.
        let offset = ring_buffer_offset(&g, 10, 9, 0, 0);
        assert_eq!(offset, 3 << g.type_index_bits());
    }

    #[test]
    fn ring_offset_packs_type_and_index() {
        let g = geometry();
        let offset = ring_buffer_offset(&g, 0, 0, 1, 5);
        assert_eq!(offset, (1 << 8) | 5);
    }
}
