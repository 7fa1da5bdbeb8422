// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Spike keys and the bit-packing geometry shared by the row codec and the
//! ring buffer.

use thiserror::Error;

/// Opaque 32-bit identifier of a firing source.
///
/// Some bits encode source-core coordinates, others a core-local neuron
/// index. The only contract this crate relies on is that
/// `(key & entry.mask) == entry.key` identifies at most one population-table
/// entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpikeKey(pub u32);

impl core::fmt::Display for SpikeKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("delay_bits must be > 0")]
    ZeroDelayBits,

    #[error("index_bits must be > 0")]
    ZeroIndexBits,

    #[error(
        "packed field widths exceed the 16 low bits of a synapse word: \
         delay={delay_bits} + type={type_bits} + index={index_bits} > 16"
    )]
    FieldOverflow {
        delay_bits: u8,
        type_bits: u8,
        index_bits: u8,
    },
}

/// Bit widths of the packed synapse-word fields for one core.
///
/// A fixed synapse word is `weight << 16 | delay << (type+index bits) |
/// type << index bits | index`; a plastic control half-word is the same
/// layout without the weight. The three widths must fit in the low 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowGeometry {
    delay_bits: u8,
    type_bits: u8,
    index_bits: u8,
}

impl RowGeometry {
    pub fn new(delay_bits: u8, type_bits: u8, index_bits: u8) -> Result<Self, GeometryError> {
        if delay_bits == 0 {
            return Err(GeometryError::ZeroDelayBits);
        }
        if index_bits == 0 {
            return Err(GeometryError::ZeroIndexBits);
        }
        if delay_bits as u32 + type_bits as u32 + index_bits as u32 > 16 {
            return Err(GeometryError::FieldOverflow {
                delay_bits,
                type_bits,
                index_bits,
            });
        }
        Ok(Self {
            delay_bits,
            type_bits,
            index_bits,
        })
    }

    pub fn delay_bits(&self) -> u32 {
        self.delay_bits as u32
    }

    pub fn type_bits(&self) -> u32 {
        self.type_bits as u32
    }

    pub fn index_bits(&self) -> u32 {
        self.index_bits as u32
    }

    /// Combined width of the synapse-type and neuron-index fields.
    pub fn type_index_bits(&self) -> u32 {
        self.type_bits() + self.index_bits()
    }

    /// Number of distinct delay slots (`2^delay_bits`).
    pub fn max_delay(&self) -> u32 {
        1 << self.delay_bits()
    }

    pub fn delay_mask(&self) -> u32 {
        self.max_delay() - 1
    }

    pub fn type_mask(&self) -> u32 {
        (1 << self.type_bits()) - 1
    }

    pub fn index_mask(&self) -> u32 {
        (1 << self.index_bits()) - 1
    }

    /// Total ring-buffer slot count: one per (delay, type, index) triple.
    pub fn ring_slots(&self) -> usize {
        1 << (self.delay_bits() + self.type_index_bits())
    }

    /// Length of the per-timestep front slice handed to the neuron stage.
    pub fn slice_len(&self) -> usize {
        1 << self.type_index_bits()
    }
}
