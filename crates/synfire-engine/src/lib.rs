// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Synfire Engine
//!
//! The spike-driven synaptic delivery pipeline for one core of a many-core
//! neuromorphic accelerator. A multicast spike key arrives by interrupt, is
//! resolved through the population table to a synaptic row in shared memory,
//! fetched over an asynchronous DMA channel into one of two ping-pong
//! buffers, decoded, and accumulated into the delay-indexed ring buffer -
//! all inside a hard real-time budget with no dynamic memory growth after
//! initialization.
//!
//! ## Control flow
//! ```text
//! interrupt ──> SpikeQueue ──> DmaScheduler ──> PopulationTable
//!                                  │                 │ row address
//!                                  v                 v
//!                            ping-pong row <─── DmaChannel <─── shared memory
//!                                  │
//!                  fixed synapses  │  plastic synapses
//!                        v         v        v
//!                   RingBuffer <── │ ── PlasticityRule (+ write-back)
//!                        │
//!                        v  once per timestep, before the flush deadline
//!                  neuron-update stage
//! ```

pub mod bitfield;
pub mod dma;
pub mod population_table;
pub mod provenance;
pub mod rewiring;
pub mod scheduler;
pub mod spike_queue;
pub mod timer;

pub use bitfield::{ConnectivityBitfields, DtcmBudget};
pub use dma::{
    shared_sdram, DmaChannel, DmaCompletion, DmaError, HostDma, RowBufferId, SharedSdram, Timeout,
};
pub use population_table::{
    AddressListEntry, LookupResult, PopulationTable, PopulationTableEntry, RowFetch, RowMatch,
    TableError,
};
pub use provenance::ProvenanceCounters;
pub use rewiring::{
    rewiring_channel, NoRewiring, RewiringRequest, RewiringSender, RewiringTrigger,
};
pub use scheduler::{
    pair_rule_from_config, DmaScheduler, SchedulerError, SchedulerState, TimestepSummary,
};
pub use spike_queue::{QueueError, SpikeQueue};
pub use timer::{FreeRunningTimer, HostTimer, ManualTimer};
