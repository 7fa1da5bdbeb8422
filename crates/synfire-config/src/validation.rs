// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation.
//!
//! Checks the numeric invariants the pipeline relies on, so a bad file fails
//! at load time with a readable message instead of at the first spike.

use crate::{ConfigError, ConfigResult, SynfireConfig};

pub fn validate(config: &SynfireConfig) -> ConfigResult<()> {
    let g = &config.geometry;
    if g.delay_bits == 0 {
        return Err(ConfigError::Validation(
            "geometry.delay_bits must be > 0".into(),
        ));
    }
    if g.index_bits == 0 {
        return Err(ConfigError::Validation(
            "geometry.index_bits must be > 0".into(),
        ));
    }
    let field_bits = g.delay_bits as u32 + g.type_bits as u32 + g.index_bits as u32;
    if field_bits > 16 {
        return Err(ConfigError::Validation(format!(
            "geometry bit widths must fit in 16 bits, got {field_bits}"
        )));
    }

    if config.queue.capacity < 2 || !config.queue.capacity.is_power_of_two() {
        return Err(ConfigError::Validation(format!(
            "queue.capacity must be a power of two >= 2, got {}",
            config.queue.capacity
        )));
    }

    if config.dma.poll_limit == 0 {
        return Err(ConfigError::Validation(
            "dma.poll_limit must be > 0".into(),
        ));
    }
    if config.dma.row_buffer_words == 0 {
        return Err(ConfigError::Validation(
            "dma.row_buffer_words must be > 0".into(),
        ));
    }
    // The flush stages the front ring-buffer slice through a row buffer, so
    // the buffer must hold slice_len u16 entries.
    let slice_bytes = 2usize << (g.type_bits as u32 + g.index_bits as u32);
    if config.dma.row_buffer_words * 4 < slice_bytes {
        return Err(ConfigError::Validation(format!(
            "dma.row_buffer_words * 4 ({}) cannot hold the {slice_bytes} byte flush slice",
            config.dma.row_buffer_words * 4
        )));
    }

    let p = &config.plasticity;
    if p.min_weight > p.max_weight {
        return Err(ConfigError::Validation(format!(
            "plasticity.min_weight ({}) > max_weight ({})",
            p.min_weight, p.max_weight
        )));
    }
    if p.enabled && (p.tau_plus <= 0.0 || p.tau_minus <= 0.0) {
        return Err(ConfigError::Validation(
            "plasticity time constants must be positive".into(),
        ));
    }
    Ok(())
}
