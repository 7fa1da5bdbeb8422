// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Synfire Core
//!
//! Platform-agnostic primitives of the spike-driven synaptic delivery
//! pipeline. Everything in this crate is pure data manipulation: no DMA, no
//! interrupts, no clocks. The scheduler crate composes these pieces into the
//! real-time pipeline.
//!
//! ## Contents
//! - [`types`] - spike keys and the bit-packing geometry of a core
//! - [`row`] - the synaptic row binary format and its codec
//! - [`ring_buffer`] - delay-indexed saturating input accumulator
//! - [`event_history`] - bounded circular spike history for plasticity

pub mod event_history;
pub mod ring_buffer;
pub mod row;
pub mod types;

pub use event_history::{EventHistory, HistoryError, HistoryWindow};
pub use ring_buffer::RingBuffer;
pub use row::codec::{ring_buffer_offset, ControlWord, FixedSynapse};
pub use row::{RowError, SynapticRowView, SynapticRowViewMut};
pub use types::{GeometryError, RowGeometry, SpikeKey};
