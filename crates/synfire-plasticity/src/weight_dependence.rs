// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Additive weight dependence.
//!
//! Two mutually inconsistent loaders for this configuration exist in the
//! source history: one walks a per-synapse-type record array, the other
//! assumes a single global record. They are kept as distinct named
//! constructors rather than reconciled; the configuration layer selects one
//! by name.

use crate::lut::STDP_FIXED_SHIFT;
use crate::rule::WeightUpdate;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlasticityError {
    #[error("no weight-dependence record for synapse type {synapse_type} (have {available})")]
    MissingSynapseTypeRecord {
        synapse_type: usize,
        available: usize,
    },

    #[error("invalid weight bounds: min={min} > max={max}")]
    InvalidWeightBounds { min: u16, max: u16 },
}

/// One weight-dependence configuration record as laid out by the host tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightDependenceRecord {
    pub min_weight: u16,
    pub max_weight: u16,
    /// Potentiation scale (A2+), trace fixed point.
    pub a2_plus: u16,
    /// Depression scale (A2-), trace fixed point.
    pub a2_minus: u16,
}

/// Additive weight dependence: `w' = clamp(w + A2+·pot - A2-·dep)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdditiveWeightDependence {
    min_weight: u16,
    max_weight: u16,
    a2_plus: u16,
    a2_minus: u16,
}

impl AdditiveWeightDependence {
    fn from_record(record: WeightDependenceRecord) -> Result<Self, PlasticityError> {
        if record.min_weight > record.max_weight {
            return Err(PlasticityError::InvalidWeightBounds {
                min: record.min_weight,
                max: record.max_weight,
            });
        }
        Ok(Self {
            min_weight: record.min_weight,
            max_weight: record.max_weight,
            a2_plus: record.a2_plus,
            a2_minus: record.a2_minus,
        })
    }

    /// Loader variant A: per-synapse-type record array.
    pub fn from_per_type_records(
        records: &[WeightDependenceRecord],
        synapse_type: usize,
    ) -> Result<Self, PlasticityError> {
        let record = records.get(synapse_type).ok_or(
            PlasticityError::MissingSynapseTypeRecord {
                synapse_type,
                available: records.len(),
            },
        )?;
        Self::from_record(*record)
    }

    /// Loader variant B: one global record regardless of synapse type.
    pub fn from_global_record(record: WeightDependenceRecord) -> Result<Self, PlasticityError> {
        Self::from_record(record)
    }

    pub fn min_weight(&self) -> u16 {
        self.min_weight
    }

    pub fn max_weight(&self) -> u16 {
        self.max_weight
    }

    /// Apply the accumulated potentiation/depression to a weight.
    ///
    /// Accumulators are trace fixed point; the scale product is shifted back
    /// down before the clamped add.
    pub fn apply(&self, old_weight: u16, potentiation: u32, depression: u32) -> WeightUpdate {
        let up = (potentiation * self.a2_plus as u32) >> STDP_FIXED_SHIFT;
        let down = (depression * self.a2_minus as u32) >> STDP_FIXED_SHIFT;
        let raw = old_weight as i64 + up as i64 - down as i64;
        let clamped = raw.clamp(self.min_weight as i64, self.max_weight as i64);
        WeightUpdate {
            weight: clamped as u16,
            saturated: clamped != raw,
        }
    }
}
