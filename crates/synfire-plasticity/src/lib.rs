// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Synfire Plasticity
//!
//! The generic deferred-update protocol for trace-based plasticity rules.
//!
//! A rule never sees a spike as it arrives. Instead, every synaptic row
//! carries a small pre-synaptic event history and each post-synaptic neuron
//! keeps its own; when a row is next fetched, the two histories are merged in
//! time order and replayed against the rule. This keeps the interrupt path
//! free of rule-specific math and makes every rule interchangeable behind
//! [`PlasticityRule`].
//!
//! One exemplar rule ships here: pair-based STDP with additive weight
//! dependence. All numeric work is 16-bit fixed point with precomputed decay
//! lookup tables; nothing silently overflows.

pub mod deferred;
pub mod lut;
pub mod pair;
pub mod rule;
pub mod weight_dependence;

pub use deferred::deferred_weight_update;
pub use lut::{fixed_mul, DecayLut, FIXED_ONE, STDP_FIXED_SHIFT};
pub use pair::{PairRule, PairRuleConfig, PairState};
pub use rule::{PlasticityRule, WeightUpdate};
pub use weight_dependence::{AdditiveWeightDependence, PlasticityError, WeightDependenceRecord};
