// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Provenance counters.
//!
//! All user-visible failure behaviour of the pipeline flows through these
//! counters plus the run-level error code; recoverable conditions are
//! counted, never silent and never fatal. An external reporting collaborator
//! consumes the snapshot at the end of a run.

use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ProvenanceCounters {
    /// Population-table hits that ultimately yielded no synapses.
    pub ghost_pop_table_searches: u64,
    /// Spike keys matching no configured table entry at all.
    pub invalid_master_pop_hits: u64,
    /// Spikes suppressed by the connectivity-bitfield pre-filter.
    pub bitfield_filtered_packets: u64,
    /// Spikes rejected because the input queue was full.
    pub input_buffer_overflows: u64,
    /// Spikes discarded at the flush deadline under the drop policy.
    pub dropped_at_deadline: u64,
    /// Completed DMA transfers (fetches, write-backs, and flushes).
    pub dma_completes: u64,
    /// Spikes fully delivered into the ring buffer.
    pub spikes_processed: u64,
    /// Structural rewiring attempts that succeeded.
    pub successful_rewires: u64,
    /// Saturating additions in the ring buffer.
    pub ring_buffer_saturations: u64,
    /// Plastic weight updates clamped at a weight bound.
    pub plastic_weight_saturations: u64,
}
