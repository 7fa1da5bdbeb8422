// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fixed-point arithmetic and precomputed exponential-decay tables.
//!
//! All trace math runs in unsigned 16-bit fixed point with
//! [`STDP_FIXED_SHIFT`] fraction bits. Decays are table lookups indexed by
//! `elapsed_time >> shift`; past the table bound the lookup saturates at the
//! last entry instead of extrapolating.

use tracing::debug;

/// Fraction bits of the trace fixed-point format.
pub const STDP_FIXED_SHIFT: u32 = 11;

/// 1.0 in trace fixed point.
pub const FIXED_ONE: u16 = 1 << STDP_FIXED_SHIFT;

/// Fixed-point multiply with the explicit shift constant. Clamped: a product
/// that exceeds the format saturates at `u16::MAX` rather than wrapping.
#[inline]
pub fn fixed_mul(a: u16, b: u16) -> u16 {
    let product = (a as u32 * b as u32) >> STDP_FIXED_SHIFT;
    product.min(u16::MAX as u32) as u16
}

/// Precomputed `exp(-t/tau)` in trace fixed point.
#[derive(Debug, Clone)]
pub struct DecayLut {
    table: Vec<u16>,
    time_shift: u32,
}

impl DecayLut {
    /// Build a table for time constant `tau` (in timesteps). One entry per
    /// `2^time_shift` timesteps, extended until the decay rounds to zero.
    pub fn exponential(tau: f32, time_shift: u32) -> Self {
        let tau = tau.max(1e-6);
        let mut table = Vec::new();
        loop {
            let t = (table.len() << time_shift) as f32;
            let value = ((-t / tau).exp() * FIXED_ONE as f32).round() as u16;
            table.push(value);
            if value == 0 {
                break;
            }
        }
        debug!(
            entries = table.len(),
            tau, time_shift, "built exponential decay table"
        );
        Self { table, time_shift }
    }

    /// Decay factor after `elapsed` timesteps. Saturates at the table bound.
    #[inline]
    pub fn lookup(&self, elapsed: u32) -> u16 {
        let index = (elapsed >> self.time_shift) as usize;
        let index = index.min(self.table.len() - 1);
        self.table[index]
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
