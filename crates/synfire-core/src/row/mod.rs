// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The synaptic row binary format.
//!
//! A row is the unit of DMA transfer: the block of per-connection data
//! associated with one spike key. Layout, in little-endian u32 words:
//!
//! ```text
//! word 0            plastic-region size P in words (0 = purely static row)
//! words 1 ..= P     plastic region:
//!                     [0]        pre-event count (<= 4)
//!                     [1..5]     pre-event times
//!                     [5..7]     pre-event traces, u16 packed 2/word
//!                     [7..P]     per-synapse plastic half-words (weights),
//!                                u16 packed 2/word, low half first
//! word P+1          fixed-synapse count F
//! word P+2          plastic-control count C
//! next F words      packed 32-bit fixed-synapse words
//! next (C+1)/2      packed 16-bit control half-words, low half first
//! ```
//!
//! The transferred byte count is `(row_length + HEADER_WORDS) * 4` where
//! `row_length = P + F + (C+1)/2`. Write-back after a plasticity update
//! covers only words `0 ..= P` (the plastic byte range), never the fixed
//! region.

pub mod codec;

use crate::event_history::EventHistory;
use thiserror::Error;

/// Words of row header: plastic-size word + fixed count + control count.
pub const HEADER_WORDS: usize = 3;

/// Capacity of the in-row pre-synaptic event history.
pub const PRE_HISTORY_CAPACITY: usize = 4;

/// Words occupied by the packed pre-event history (count + times + traces).
pub const PRE_HISTORY_WORDS: usize = 1 + PRE_HISTORY_CAPACITY + PRE_HISTORY_CAPACITY / 2;

/// Pre-synaptic history as stored in a row: raw u16 traces, capacity 4.
pub type PreEventHistory = EventHistory<u16, PRE_HISTORY_CAPACITY>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("row block truncated: need at least {needed} bytes, have {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("row length is not a whole number of words: {bytes} bytes")]
    UnalignedLength { bytes: usize },

    #[error("internally inconsistent row: header implies {expected} words, block has {actual}")]
    InconsistentLength { expected: usize, actual: usize },

    #[error("plastic region of {plastic_words} words cannot hold {controls} plastic synapses")]
    PlasticRegionTooSmall {
        plastic_words: usize,
        controls: usize,
    },

    #[error("row declares {controls} plastic controls but has no plastic region")]
    ControlsWithoutPlasticRegion { controls: usize },

    #[error("pre-event history corrupt: count={count} exceeds capacity {capacity}")]
    PreHistoryOvercount { count: usize, capacity: usize },

    #[error("pre-event history corrupt: times not non-decreasing at slot {slot}")]
    PreHistoryDisorder { slot: usize },
}

fn read_word(bytes: &[u8], word: usize) -> u32 {
    let at = word * 4;
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn write_word(bytes: &mut [u8], word: usize, value: u32) {
    let at = word * 4;
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn read_half(bytes: &[u8], half: usize) -> u16 {
    let at = half * 2;
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn write_half(bytes: &mut [u8], half: usize, value: u16) {
    let at = half * 2;
    bytes[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

/// Validated layout facts shared by the read and write views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RowLayout {
    plastic_words: usize,
    fixed_count: usize,
    control_count: usize,
}

impl RowLayout {
    fn parse(bytes: &[u8]) -> Result<Self, RowError> {
        if bytes.len() % 4 != 0 {
            return Err(RowError::UnalignedLength { bytes: bytes.len() });
        }
        let words = bytes.len() / 4;
        if words < HEADER_WORDS {
            return Err(RowError::Truncated {
                needed: HEADER_WORDS * 4,
                actual: bytes.len(),
            });
        }
        let plastic_words = read_word(bytes, 0) as usize;
        if words < HEADER_WORDS + plastic_words {
            return Err(RowError::Truncated {
                needed: (HEADER_WORDS + plastic_words) * 4,
                actual: bytes.len(),
            });
        }
        let fixed_count = read_word(bytes, 1 + plastic_words) as usize;
        let control_count = read_word(bytes, 2 + plastic_words) as usize;

        let expected = HEADER_WORDS + plastic_words + fixed_count + control_count.div_ceil(2);
        if expected != words {
            return Err(RowError::InconsistentLength {
                expected,
                actual: words,
            });
        }
        if control_count > 0 {
            if plastic_words == 0 {
                return Err(RowError::ControlsWithoutPlasticRegion {
                    controls: control_count,
                });
            }
            if plastic_words < PRE_HISTORY_WORDS
                || (plastic_words - PRE_HISTORY_WORDS) * 2 < control_count
            {
                return Err(RowError::PlasticRegionTooSmall {
                    plastic_words,
                    controls: control_count,
                });
            }
        }
        Ok(Self {
            plastic_words,
            fixed_count,
            control_count,
        })
    }

    fn fixed_base(&self) -> usize {
        HEADER_WORDS + self.plastic_words
    }

    fn control_base_halves(&self) -> usize {
        (self.fixed_base() + self.fixed_count) * 2
    }

    fn weight_base_halves(&self) -> usize {
        (1 + PRE_HISTORY_WORDS) * 2
    }
}

/// Read-only typed accessor over a fetched row block.
#[derive(Debug)]
pub struct SynapticRowView<'a> {
    bytes: &'a [u8],
    layout: RowLayout,
}

impl<'a> SynapticRowView<'a> {
    /// Validate and wrap a row block. Length inconsistency is fatal to the
    /// run (the caller must not keep processing a corrupt transfer).
    pub fn new(bytes: &'a [u8]) -> Result<Self, RowError> {
        let layout = RowLayout::parse(bytes)?;
        Ok(Self { bytes, layout })
    }

    pub fn plastic_words(&self) -> usize {
        self.layout.plastic_words
    }

    pub fn fixed_count(&self) -> usize {
        self.layout.fixed_count
    }

    pub fn control_count(&self) -> usize {
        self.layout.control_count
    }

    pub fn has_plastic_region(&self) -> bool {
        self.layout.plastic_words > 0
    }

    /// Packed fixed-synapse word `i`.
    pub fn fixed_word(&self, i: usize) -> u32 {
        debug_assert!(i < self.layout.fixed_count);
        read_word(self.bytes, self.layout.fixed_base() + i)
    }

    /// Packed plastic control half-word `i`.
    pub fn control_half_word(&self, i: usize) -> u16 {
        debug_assert!(i < self.layout.control_count);
        read_half(self.bytes, self.layout.control_base_halves() + i)
    }

    /// Current plastic weight of synapse `i`.
    pub fn plastic_weight(&self, i: usize) -> u16 {
        debug_assert!(i < self.layout.control_count);
        read_half(self.bytes, self.layout.weight_base_halves() + i)
    }

    /// Decode the in-row pre-synaptic event history.
    pub fn pre_history(&self) -> Result<PreEventHistory, RowError> {
        let count = read_word(self.bytes, 1) as usize;
        if count > PRE_HISTORY_CAPACITY {
            return Err(RowError::PreHistoryOvercount {
                count,
                capacity: PRE_HISTORY_CAPACITY,
            });
        }
        let mut history = PreEventHistory::new();
        for slot in 0..count {
            let time = read_word(self.bytes, 2 + slot);
            let trace = read_half(self.bytes, (2 + PRE_HISTORY_CAPACITY) * 2 + slot);
            history
                .push(time, trace)
                .map_err(|_| RowError::PreHistoryDisorder { slot })?;
        }
        Ok(history)
    }

    /// The byte range rewritten by a plasticity write-back: the size word
    /// plus the whole plastic region. The fixed region is never re-sent.
    pub fn plastic_range_bytes(&self) -> core::ops::Range<usize> {
        0..(1 + self.layout.plastic_words) * 4
    }
}

/// Mutable typed accessor used while a plasticity update rewrites the
/// plastic region in place.
#[derive(Debug)]
pub struct SynapticRowViewMut<'a> {
    bytes: &'a mut [u8],
    layout: RowLayout,
}

impl<'a> SynapticRowViewMut<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Result<Self, RowError> {
        let layout = RowLayout::parse(bytes)?;
        Ok(Self { bytes, layout })
    }

    pub fn control_count(&self) -> usize {
        self.layout.control_count
    }

    pub fn plastic_weight(&self, i: usize) -> u16 {
        debug_assert!(i < self.layout.control_count);
        read_half(self.bytes, self.layout.weight_base_halves() + i)
    }

    pub fn set_plastic_weight(&mut self, i: usize, weight: u16) {
        debug_assert!(i < self.layout.control_count);
        write_half(self.bytes, self.layout.weight_base_halves() + i, weight);
    }

    /// Store the updated pre-event history back into the plastic region.
    pub fn set_pre_history(&mut self, history: &PreEventHistory) {
        write_word(self.bytes, 1, history.len() as u32);
        for (slot, (&time, &trace)) in history.times().iter().zip(history.traces()).enumerate() {
            write_word(self.bytes, 2 + slot, time);
            write_half(self.bytes, (2 + PRE_HISTORY_CAPACITY) * 2 + slot, trace);
        }
    }

    pub fn plastic_range_bytes(&self) -> core::ops::Range<usize> {
        0..(1 + self.layout.plastic_words) * 4
    }
}

/// Host-side row assembly, used by tests and by table-generation tooling.
/// The placement tool that normally produces rows emits this exact layout.
#[derive(Debug, Default, Clone)]
pub struct RowBuilder {
    pre_history: PreEventHistory,
    fixed_words: Vec<u32>,
    control_half_words: Vec<u16>,
    plastic_weights: Vec<u16>,
}

impl RowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pre_history(mut self, history: PreEventHistory) -> Self {
        self.pre_history = history;
        self
    }

    pub fn fixed_word(mut self, word: u32) -> Self {
        self.fixed_words.push(word);
        self
    }

    pub fn plastic_synapse(mut self, control: u16, weight: u16) -> Self {
        self.control_half_words.push(control);
        self.plastic_weights.push(weight);
        self
    }

    /// Row length in words, exclusive of the header, as stored in the
    /// address list.
    pub fn row_length(&self) -> usize {
        let plastic = if self.control_half_words.is_empty() {
            0
        } else {
            PRE_HISTORY_WORDS + self.plastic_weights.len().div_ceil(2)
        };
        plastic + self.fixed_words.len() + self.control_half_words.len().div_ceil(2)
    }

    pub fn build(&self) -> Vec<u8> {
        let plastic_words = if self.control_half_words.is_empty() {
            0
        } else {
            PRE_HISTORY_WORDS + self.plastic_weights.len().div_ceil(2)
        };
        let total_words =
            HEADER_WORDS + plastic_words + self.fixed_words.len()
                + self.control_half_words.len().div_ceil(2);
        let mut bytes = vec![0u8; total_words * 4];

        write_word(&mut bytes, 0, plastic_words as u32);
        if plastic_words > 0 {
            write_word(&mut bytes, 1, self.pre_history.len() as u32);
            for (slot, (&time, &trace)) in self
                .pre_history
                .times()
                .iter()
                .zip(self.pre_history.traces())
                .enumerate()
            {
                write_word(&mut bytes, 2 + slot, time);
                write_half(&mut bytes, (2 + PRE_HISTORY_CAPACITY) * 2 + slot, trace);
            }
            for (i, &weight) in self.plastic_weights.iter().enumerate() {
                write_half(&mut bytes, (1 + PRE_HISTORY_WORDS) * 2 + i, weight);
            }
        }

        let fixed_base = 1 + plastic_words;
        write_word(&mut bytes, fixed_base, self.fixed_words.len() as u32);
        write_word(&mut bytes, fixed_base + 1, self.control_half_words.len() as u32);
        for (i, &word) in self.fixed_words.iter().enumerate() {
            write_word(&mut bytes, fixed_base + 2 + i, word);
        }
        let control_base = (fixed_base + 2 + self.fixed_words.len()) * 2;
        for (i, &half) in self.control_half_words.iter().enumerate() {
            write_half(&mut bytes, control_base + i, half);
        }
        bytes
    }
}
