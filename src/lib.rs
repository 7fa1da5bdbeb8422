// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Synfire - synaptic delivery firmware for a neuromorphic core
//!
//! Synfire implements the synapse-side pipeline of one core in a many-core
//! neuromorphic accelerator: spikes arrive as 32-bit multicast keys, are
//! resolved through a binary-searched population table to synaptic rows in
//! shared memory, fetched over an asynchronous DMA channel into ping-pong
//! buffers, decoded, and accumulated into a delay-indexed ring buffer whose
//! front slice is flushed to the neuron-update stage once per timestep -
//! inside a hard real-time budget, with optional STDP plasticity and
//! write-back of modified rows.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! synfire = "0.1"
//! ```
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use synfire::prelude::*;
//!
//! # fn table_blob() -> Vec<u8> { Vec::new() }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = synfire::config::load_config(None)?;
//! let table = PopulationTable::from_blob(&table_blob())?;
//! let queue = Arc::new(SpikeQueue::new(config.queue.capacity)?);
//! let sdram = shared_sdram(vec![0u8; 1 << 20]);
//! let dma = HostDma::new(sdram, config.dma.row_buffer_words);
//!
//! let rule = pair_rule_from_config(&config.plasticity)?;
//! let mut scheduler =
//!     DmaScheduler::new(&config, table, queue.clone(), dma, HostTimer::new(), Some(rule))?;
//!
//! for time in 0..1000 {
//!     queue.push(SpikeKey(0x1005));
//!     scheduler.run_timestep(time, 1_000)?;
//! }
//! println!("{:?}", scheduler.counters());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: synfire-core                               │
//! │  (row codec, ring buffer, event history)                │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Algorithms: synfire-plasticity                         │
//! │  (deferred merge walk, pair-based STDP)                 │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Pipeline: synfire-engine                               │
//! │  (population table, spike queue, DMA scheduler)         │
//! └─────────────────────────────────────────────────────────┘
//!
//! Cross-cutting: synfire-config, synfire-observability
//! ```
//!
//! ## Feature Flags
//!
//! - **`observability`** (default): tracing-subscriber initialization
//!   through [`observability`].

pub use synfire_core as core;

pub use synfire_plasticity as plasticity;

pub use synfire_engine as engine;

pub use synfire_config as config;

#[cfg(feature = "observability")]
pub use synfire_observability as observability;

/// Everything needed to stand up and pump the pipeline.
pub mod prelude {
    pub use crate::config::{DeadlinePolicy, SynfireConfig};
    pub use crate::core::{RingBuffer, RowGeometry, SpikeKey, SynapticRowView};
    pub use crate::engine::{
        pair_rule_from_config, rewiring_channel, shared_sdram, DmaChannel, DmaScheduler, HostDma,
        HostTimer, LookupResult, ManualTimer, PopulationTable, ProvenanceCounters, SpikeQueue,
    };
    pub use crate::plasticity::{PairRule, PairRuleConfig, PlasticityRule};

    #[cfg(feature = "observability")]
    pub use crate::observability::init_logging_default;
}
