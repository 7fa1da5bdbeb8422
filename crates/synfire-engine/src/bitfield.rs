// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-source connectivity bitfields consulted before any row fetch.
//!
//! Each population-table entry may carry one bit per source neuron saying
//! whether that neuron connects to anything on this core. A clear bit lets
//! the scheduler skip the DMA entirely. Bitfields live in fast local memory,
//! which is scarce: allocation goes through [`DtcmBudget`] and filtering
//! degrades to "fetch everything" for entries whose bitfield did not fit.

use ahash::AHashMap;
use tracing::{debug, warn};

/// Remaining fast-memory allowance for bitfield storage, in bytes.
///
/// Exhaustion is not an error: entries without a resident bitfield simply
/// lose the pre-filter, trading DMA bandwidth for memory.
#[derive(Debug, Clone)]
pub struct DtcmBudget {
    remaining: usize,
    exhausted_logged: bool,
}

impl DtcmBudget {
    pub fn new(bytes: usize) -> Self {
        Self { remaining: bytes, exhausted_logged: false }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    fn try_take(&mut self, bytes: usize) -> bool {
        if bytes <= self.remaining {
            self.remaining -= bytes;
            true
        } else {
            if !self.exhausted_logged {
                warn!(
                    requested = bytes,
                    remaining = self.remaining,
                    "bitfield budget exhausted, later sources fall back to unfiltered fetches"
                );
                self.exhausted_logged = true;
            }
            false
        }
    }
}

/// Bitfields keyed by population-table entry index.
#[derive(Debug, Default)]
pub struct ConnectivityBitfields {
    fields: AHashMap<usize, Vec<u32>>,
    resident: usize,
    skipped: usize,
}

impl ConnectivityBitfields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a bitfield for `entry_index`, one bit per source neuron,
    /// charged against `budget`. Returns whether it became resident.
    pub fn install(
        &mut self,
        entry_index: usize,
        words: Vec<u32>,
        budget: &mut DtcmBudget,
    ) -> bool {
        let bytes = words.len() * 4;
        if !budget.try_take(bytes) {
            self.skipped += 1;
            return false;
        }
        debug!(entry_index, bytes, "bitfield resident");
        self.resident += 1;
        self.fields.insert(entry_index, words);
        true
    }

    /// Whether `neuron` in the source population of `entry_index` connects to
    /// this core. `None` means no bitfield is resident and the caller must
    /// fetch the row to find out.
    pub fn is_connected(&self, entry_index: usize, neuron: u32) -> Option<bool> {
        let words = self.fields.get(&entry_index)?;
        let word = (neuron / 32) as usize;
        if word >= words.len() {
            // Neuron id beyond the bitfield; treat as unknown rather than
            // silently dropping the spike.
            return None;
        }
        Some(words[word] >> (neuron % 32) & 1 == 1)
    }

    pub fn resident_count(&self) -> usize {
        self.resident
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_by_bit() {
        let mut budget = DtcmBudget::new(64);
        let mut fields = ConnectivityBitfields::new();
        // Neurons 0 and 33 connected, everything else not.
        assert!(fields.install(3, vec![0b1, 0b10], &mut budget));
        assert_eq!(fields.is_connected(3, 0), Some(true));
        assert_eq!(fields.is_connected(3, 1), Some(false));
        assert_eq!(fields.is_connected(3, 33), Some(true));
        assert_eq!(fields.is_connected(3, 34), Some(false));
    }

    #[test]
    fn unknown_entry_is_unfiltered() {
        let fields = ConnectivityBitfields::new();
        assert_eq!(fields.is_connected(0, 5), None);
    }

    #[test]
    fn neuron_beyond_field_is_unknown() {
        let mut budget = DtcmBudget::new(64);
        let mut fields = ConnectivityBitfields::new();
        fields.install(0, vec![0xFFFF_FFFF], &mut budget);
        assert_eq!(fields.is_connected(0, 31), Some(true));
        assert_eq!(fields.is_connected(0, 32), None);
    }

    #[test]
    fn budget_exhaustion_degrades_not_fails() {
        let mut budget = DtcmBudget::new(8);
        let mut fields = ConnectivityBitfields::new();
        assert!(fields.install(0, vec![0, 0], &mut budget));
        assert_eq!(budget.remaining(), 0);
        assert!(!fields.install(1, vec![0], &mut budget));
        assert_eq!(fields.is_connected(1, 0), None);
        assert_eq!(fields.resident_count(), 1);
        assert_eq!(fields.skipped_count(), 1);
    }
}
