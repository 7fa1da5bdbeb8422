// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Master population table: multicast key to synaptic-row address.
//!
//! The table is a sorted array of `(key, mask)` entries binary-searched on
//! `spike & mask == key`, each pointing at one or more packed address-list
//! words. It is generated off-device and loaded here from its little-endian
//! binary blob; the loader validates sort order and `(key, mask)`
//! disjointness up front so the hot lookup path can assume them.

use synfire_core::row::HEADER_WORDS;
use synfire_core::types::SpikeKey;
use thiserror::Error;
use tracing::trace;

use crate::bitfield::ConnectivityBitfields;

/// Words per packed table entry in the binary blob.
pub const ENTRY_WORDS: usize = 5;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("table blob truncated: need {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("entry {index} key {key:#010x} not ascending after {previous:#010x}")]
    UnsortedEntries { index: usize, key: u32, previous: u32 },
    #[error("entries {first} and {second} have overlapping (key, mask) ranges")]
    OverlappingEntries { first: usize, second: usize },
    #[error("entry {index} key {key:#010x} has bits outside its mask {mask:#010x}")]
    KeyOutsideMask { index: usize, key: u32, mask: u32 },
    #[error("entry {index} addresses {start}..{end} exceed address list of {n_addresses}")]
    AddressIndexOutOfRange { index: usize, start: usize, end: usize, n_addresses: usize },
    #[error("entry {index} has an empty address range")]
    EmptyEntry { index: usize },
}

/// One row of the master population table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopulationTableEntry {
    pub key: u32,
    pub mask: u32,
    pub start_index: u16,
    pub count: u16,
    pub core_mask: u16,
    pub mask_shift: u16,
    pub n_neurons: u16,
    pub n_words: u16,
    pub extra_info: bool,
}

impl PopulationTableEntry {
    fn unpack(words: &[u32; ENTRY_WORDS]) -> Self {
        Self {
            key: words[0],
            mask: words[1],
            start_index: (words[2] & 0xFFFF) as u16,
            count: (words[2] >> 16) as u16,
            core_mask: (words[3] & 0xFFFF) as u16,
            mask_shift: (words[3] >> 16) as u16,
            n_neurons: (words[4] & 0xFFFF) as u16,
            n_words: ((words[4] >> 16) & 0x7FFF) as u16,
            extra_info: words[4] >> 31 == 1,
        }
    }

    pub fn pack(&self) -> [u32; ENTRY_WORDS] {
        [
            self.key,
            self.mask,
            self.start_index as u32 | (self.count as u32) << 16,
            self.core_mask as u32 | (self.mask_shift as u32) << 16,
            self.n_neurons as u32
                | (self.n_words as u32) << 16
                | (self.extra_info as u32) << 31,
        ]
    }

    /// Source-local neuron id for a spike matching this entry. The inverted
    /// mask isolates the neuron bits, `mask_shift` right-aligns them, and a
    /// nonzero `core_mask` strips the core-selection bits above the neuron
    /// id.
    pub fn neuron_id(&self, spike: SpikeKey) -> u32 {
        let mut neuron = (spike.0 & !self.mask) >> self.mask_shift;
        if self.core_mask != 0 {
            neuron &= self.core_mask as u32;
        }
        neuron
    }
}

/// One packed address-list word: where a matching row lives and how big it
/// is. `address_offset` counts 16-byte units from the synaptic-matrix base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressListEntry {
    pub row_length: u8,
    pub address_offset: u32,
    pub is_single: bool,
}

impl AddressListEntry {
    fn unpack(word: u32) -> Self {
        Self {
            row_length: (word & 0xFF) as u8,
            address_offset: word >> 8 & 0x7F_FFFF,
            is_single: word >> 31 == 1,
        }
    }

    pub fn pack(&self) -> u32 {
        self.row_length as u32 | self.address_offset << 8 | (self.is_single as u32) << 31
    }
}

/// A row fetch the scheduler can hand straight to the DMA channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowFetch {
    pub row_address: u32,
    pub row_bytes: usize,
    pub is_single: bool,
}

impl RowFetch {
    fn from_address(entry: AddressListEntry) -> Self {
        Self {
            row_address: entry.address_offset * 16,
            row_bytes: (entry.row_length as usize + HEADER_WORDS) * 4,
            is_single: entry.is_single,
        }
    }
}

/// A successful table hit: which entry matched, the source-local neuron, and
/// the first row fetch. Entries with `count > 1` have further fetches
/// reachable through [`PopulationTable::address_fetches`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowMatch {
    pub entry_index: usize,
    pub neuron_id: u32,
    pub remaining_fetches: usize,
    pub fetch: RowFetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupResult {
    Hit(RowMatch),
    /// A resident connectivity bitfield showed the source neuron connects to
    /// nothing on this core.
    Filtered,
    /// No entry matched the key. Counted as an invalid hit upstream.
    NotFound,
}

#[derive(Debug)]
pub struct PopulationTable {
    entries: Vec<PopulationTableEntry>,
    addresses: Vec<AddressListEntry>,
}

impl PopulationTable {
    /// Parse and validate the binary table blob.
    pub fn from_blob(blob: &[u8]) -> Result<Self, TableError> {
        let header = read_words::<2>(blob, 0)?;
        let n_entries = header[0] as usize;
        let n_addresses = header[1] as usize;
        let expected = (2 + n_entries * ENTRY_WORDS + n_addresses) * 4;
        if blob.len() < expected {
            return Err(TableError::Truncated { expected, actual: blob.len() });
        }

        let mut entries = Vec::with_capacity(n_entries);
        for i in 0..n_entries {
            let words = read_words::<ENTRY_WORDS>(blob, 2 + i * ENTRY_WORDS)?;
            entries.push(PopulationTableEntry::unpack(&words));
        }
        let mut addresses = Vec::with_capacity(n_addresses);
        for i in 0..n_addresses {
            let word = read_words::<1>(blob, 2 + n_entries * ENTRY_WORDS + i)?;
            addresses.push(AddressListEntry::unpack(word[0]));
        }
        Self::new(entries, addresses)
    }

    /// Build a table from already-unpacked parts, validating the invariants
    /// the lookup relies on.
    pub fn new(
        entries: Vec<PopulationTableEntry>,
        addresses: Vec<AddressListEntry>,
    ) -> Result<Self, TableError> {
        for (i, entry) in entries.iter().enumerate() {
            if entry.key & entry.mask != entry.key {
                return Err(TableError::KeyOutsideMask {
                    index: i,
                    key: entry.key,
                    mask: entry.mask,
                });
            }
            if entry.count == 0 {
                return Err(TableError::EmptyEntry { index: i });
            }
            let start = entry.start_index as usize;
            let end = start + entry.count as usize;
            if end > addresses.len() {
                return Err(TableError::AddressIndexOutOfRange {
                    index: i,
                    start,
                    end,
                    n_addresses: addresses.len(),
                });
            }
            if i > 0 && entry.key <= entries[i - 1].key {
                return Err(TableError::UnsortedEntries {
                    index: i,
                    key: entry.key,
                    previous: entries[i - 1].key,
                });
            }
            // Two entries overlap when some spike matches both, i.e. their
            // keys agree on every bit both masks select. Masks are arbitrary
            // so the conflicting entry need not be adjacent.
            for (j, other) in entries[..i].iter().enumerate() {
                let common = entry.mask & other.mask;
                if entry.key & common == other.key & common {
                    return Err(TableError::OverlappingEntries { first: j, second: i });
                }
            }
        }
        Ok(Self { entries, addresses })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> Option<&PopulationTableEntry> {
        self.entries.get(index)
    }

    /// Largest DMA transfer any address-list entry can demand. Direct
    /// (single-word) rows never pass through a row buffer and are excluded.
    pub fn max_row_bytes(&self) -> usize {
        self.addresses
            .iter()
            .filter(|a| !a.is_single)
            .map(|a| (a.row_length as usize + HEADER_WORDS) * 4)
            .max()
            .unwrap_or(0)
    }

    /// All row fetches for an entry, in address-list order. The scheduler
    /// uses this to queue the second and later fetches of a `count > 1` hit.
    pub fn address_fetches(&self, entry_index: usize) -> impl Iterator<Item = RowFetch> + '_ {
        let entry = &self.entries[entry_index];
        let start = entry.start_index as usize;
        self.addresses[start..start + entry.count as usize]
            .iter()
            .map(|a| RowFetch::from_address(*a))
    }

    /// Resolve a spike to its row fetch. Binary search on the masked key;
    /// masks differ per entry so the probe re-masks the spike at every step.
    pub fn lookup(&self, spike: SpikeKey, bitfields: &ConnectivityBitfields) -> LookupResult {
        let mut lo = 0usize;
        let mut hi = self.entries.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = &self.entries[mid];
            let masked = spike.0 & entry.mask;
            if masked == entry.key {
                let neuron_id = entry.neuron_id(spike);
                if bitfields.is_connected(mid, neuron_id) == Some(false) {
                    trace!(spike = %spike, neuron_id, "spike filtered by bitfield");
                    return LookupResult::Filtered;
                }
                let first = self.addresses[entry.start_index as usize];
                return LookupResult::Hit(RowMatch {
                    entry_index: mid,
                    neuron_id,
                    remaining_fetches: entry.count as usize - 1,
                    fetch: RowFetch::from_address(first),
                });
            } else if masked < entry.key {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        LookupResult::NotFound
    }

    /// Serialize back to the blob layout `from_blob` accepts. Test scaffolding
    /// for building in-memory fixtures.
    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = Vec::new();
        blob.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        blob.extend_from_slice(&(self.addresses.len() as u32).to_le_bytes());
        for entry in &self.entries {
            for word in entry.pack() {
                blob.extend_from_slice(&word.to_le_bytes());
            }
        }
        for address in &self.addresses {
            blob.extend_from_slice(&address.pack().to_le_bytes());
        }
        blob
    }
}

fn read_words<const N: usize>(blob: &[u8], word_offset: usize) -> Result<[u32; N], TableError> {
    let start = word_offset * 4;
    let end = start + N * 4;
    if end > blob.len() {
        return Err(TableError::Truncated { expected: end, actual: blob.len() });
    }
    let mut words = [0u32; N];
    for (i, word) in words.iter_mut().enumerate() {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&blob[start + i * 4..start + (i + 1) * 4]);
        *word = u32::from_le_bytes(bytes);
    }
    Ok(words)
}
