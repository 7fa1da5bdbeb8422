// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pair-based STDP, the exemplar implementation of [`PlasticityRule`].
//!
//! Each side keeps a single accumulating trace: a spike decays the trace by
//! `exp(-dt/tau)` and adds one. A pre event crossed during the merge walk
//! accumulates depression from the post trace; a post event accumulates
//! potentiation from the pre trace. Additive weight dependence turns the two
//! accumulators into a clamped weight.

use crate::lut::{fixed_mul, DecayLut, FIXED_ONE};
use crate::rule::{PlasticityRule, WeightUpdate};
use crate::weight_dependence::AdditiveWeightDependence;

/// Tunables for the pair rule, in timesteps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairRuleConfig {
    pub tau_plus: f32,
    pub tau_minus: f32,
    /// Granularity of the decay tables: one entry per `2^shift` timesteps.
    pub lut_time_shift: u32,
}

impl Default for PairRuleConfig {
    fn default() -> Self {
        Self {
            tau_plus: 20.0,
            tau_minus: 20.0,
            lut_time_shift: 0,
        }
    }
}

/// Merge-walk accumulator: potentiation and depression, trace fixed point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairState {
    pub potentiation: u32,
    pub depression: u32,
}

pub struct PairRule {
    tau_plus: DecayLut,
    tau_minus: DecayLut,
    weight_dependence: AdditiveWeightDependence,
}

impl PairRule {
    pub fn new(config: PairRuleConfig, weight_dependence: AdditiveWeightDependence) -> Self {
        Self {
            tau_plus: DecayLut::exponential(config.tau_plus, config.lut_time_shift),
            tau_minus: DecayLut::exponential(config.tau_minus, config.lut_time_shift),
            weight_dependence,
        }
    }

    pub fn weight_dependence(&self) -> &AdditiveWeightDependence {
        &self.weight_dependence
    }
}

impl PlasticityRule for PairRule {
    type PreTrace = u16;
    type PostTrace = u16;
    type UpdateState = PairState;

    fn initial_pre_trace(&self) -> u16 {
        0
    }

    fn initial_post_trace(&self) -> u16 {
        0
    }

    fn initial_update_state(&self) -> PairState {
        PairState::default()
    }

    fn add_pre_spike(&self, time: u32, last_time: u32, last_trace: u16) -> u16 {
        let decayed = fixed_mul(last_trace, self.tau_plus.lookup(time - last_time));
        decayed.saturating_add(FIXED_ONE)
    }

    fn add_post_spike(&self, time: u32, last_time: u32, last_trace: u16) -> u16 {
        let decayed = fixed_mul(last_trace, self.tau_minus.lookup(time - last_time));
        decayed.saturating_add(FIXED_ONE)
    }

    fn apply_pre_event(
        &self,
        mut state: PairState,
        time: u32,
        _last_pre_time: u32,
        _last_pre_trace: u16,
        last_post_time: u32,
        last_post_trace: u16,
    ) -> PairState {
        // Post-before-pre pairing: depression from the post trace decayed to
        // this pre spike.
        let decayed = fixed_mul(last_post_trace, self.tau_minus.lookup(time - last_post_time));
        state.depression += decayed as u32;
        state
    }

    fn apply_post_event(
        &self,
        mut state: PairState,
        time: u32,
        last_pre_time: u32,
        last_pre_trace: u16,
        _last_post_time: u32,
        _last_post_trace: u16,
    ) -> PairState {
        // Pre-before-post pairing: potentiation from the pre trace decayed
        // to this post spike.
        let decayed = fixed_mul(last_pre_trace, self.tau_plus.lookup(time - last_pre_time));
        state.potentiation += decayed as u32;
        state
    }

    fn finalize(&self, state: PairState, old_weight: u16) -> WeightUpdate {
        self.weight_dependence
            .apply(old_weight, state.potentiation, state.depression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weight_dependence::WeightDependenceRecord;

    fn rule() -> PairRule {
        let dependence = AdditiveWeightDependence::from_global_record(WeightDependenceRecord {
            min_weight: 0,
            max_weight: u16::MAX,
            a2_plus: FIXED_ONE,
            a2_minus: FIXED_ONE,
        })
        .unwrap();
        PairRule::new(PairRuleConfig::default(), dependence)
    }

    #[test]
    fn trace_accumulates_and_decays() {
        let r = rule();
        let t0 = r.add_pre_spike(10, 0, r.initial_pre_trace());
        assert_eq!(t0, FIXED_ONE, "first spike on a zero trace is exactly one");
        let t1 = r.add_pre_spike(11, 10, t0);
        assert!(t1 > FIXED_ONE, "close spikes stack");
        let t2 = r.add_pre_spike(500, 11, t1);
        assert_eq!(t2, FIXED_ONE, "a long gap decays the history away");
    }

    #[test]
    fn pre_then_post_potentiates() {
        let r = rule();
        let pre_trace = r.add_pre_spike(10, 0, 0);
        let state = r.apply_post_event(r.initial_update_state(), 15, 10, pre_trace, 0, 0);
        assert!(state.potentiation > 0);
        assert_eq!(state.depression, 0);
        let update = r.finalize(state, 1000);
        assert!(update.weight > 1000);
    }

    #[test]
    fn post_then_pre_depresses() {
        let r = rule();
        let post_trace = r.add_post_spike(10, 0, 0);
        let state = r.apply_pre_event(r.initial_update_state(), 15, 0, 0, 10, post_trace);
        assert!(state.depression > 0);
        assert_eq!(state.potentiation, 0);
        let update = r.finalize(state, 1000);
        assert!(update.weight < 1000);
    }

    #[test]
    fn closer_pairs_change_weight_more() {
        let r = rule();
        let pre_trace = r.add_pre_spike(10, 0, 0);
        let near = r.apply_post_event(r.initial_update_state(), 12, 10, pre_trace, 0, 0);
        let far = r.apply_post_event(r.initial_update_state(), 40, 10, pre_trace, 0, 0);
        assert!(near.potentiation > far.potentiation);
    }

    #[test]
    fn empty_state_finalizes_to_old_weight() {
        let r = rule();
        let update = r.finalize(r.initial_update_state(), 777);
        assert_eq!(update, WeightUpdate { weight: 777, saturated: false });
    }
}
