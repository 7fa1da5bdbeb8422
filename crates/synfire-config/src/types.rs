// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions.
//!
//! Each struct maps to a section in `synfire_configuration.toml`. Every
//! section and every field has a default, so a partial file is always valid
//! TOML-wise (validation is a separate pass).

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SynfireConfig {
    pub geometry: GeometryConfig,
    pub queue: QueueConfig,
    pub dma: DmaConfig,
    pub flush: FlushConfig,
    pub plasticity: PlasticityConfig,
}

/// Bit widths of the packed synapse-word fields.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub delay_bits: u8,
    pub type_bits: u8,
    pub index_bits: u8,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            delay_bits: 4,
            type_bits: 1,
            index_bits: 8,
        }
    }
}

/// What happens to spikes still queued when the flush deadline fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlinePolicy {
    /// Leave queued spikes for the next timestep.
    CarryOver,
    /// Drop queued spikes (always counted, never silent).
    Drop,
}

/// Input spike queue sizing and deadline policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Slot count; must be a power of two (one slot stays unusable, the
    /// queue holds capacity-1 spikes).
    pub capacity: usize,
    pub deadline_policy: DeadlinePolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            deadline_policy: DeadlinePolicy::CarryOver,
        }
    }
}

/// DMA transfer bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DmaConfig {
    /// Completion busy-poll bound; exceeding it is a fatal timeout.
    pub poll_limit: u32,
    /// Size of each ping-pong row buffer, in words. Must also hold the
    /// flushed ring-buffer slice; checked against the geometry at load.
    pub row_buffer_words: usize,
}

impl Default for DmaConfig {
    fn default() -> Self {
        Self {
            poll_limit: 100_000,
            // A maximum-length row (8-bit row_length plus header) is 258
            // words.
            row_buffer_words: 260,
        }
    }
}

/// Ring-buffer flush deadline parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FlushConfig {
    /// Fixed overhead added to the measured flush transfer cost, in timer
    /// ticks.
    pub overhead_ticks: u32,
    /// Shared-memory address the front slice is flushed to.
    pub output_address: u32,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            overhead_ticks: 16,
            output_address: 0,
        }
    }
}

/// Which historical weight-dependence loader to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightDependenceMode {
    /// Walk the per-synapse-type record array.
    PerType,
    /// Use the single global record.
    Global,
}

/// Pair-rule STDP parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlasticityConfig {
    pub enabled: bool,
    pub tau_plus: f32,
    pub tau_minus: f32,
    pub lut_time_shift: u32,
    pub weight_dependence: WeightDependenceMode,
    pub min_weight: u16,
    pub max_weight: u16,
    /// Potentiation scale (A2+), trace fixed point.
    pub a2_plus: u16,
    /// Depression scale (A2-), trace fixed point.
    pub a2_minus: u16,
}

impl Default for PlasticityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tau_plus: 20.0,
            tau_minus: 20.0,
            lut_time_shift: 0,
            weight_dependence: WeightDependenceMode::Global,
            min_weight: 0,
            max_weight: u16::MAX,
            a2_plus: 205,  // ~0.1 in 2^11 fixed point
            a2_minus: 246, // ~0.12
        }
    }
}
