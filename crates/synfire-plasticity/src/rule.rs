// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The contract every plasticity rule satisfies.
//!
//! Pair-based, triplet, and other variants all plug in behind this trait;
//! the scheduler and the deferred-update walk are written once against it.
//! Historically each rule was selected at build time via macro substitution;
//! here a rule is a value chosen at configuration time.

/// Result of finalizing one synapse update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightUpdate {
    /// New weight, already clamped to the rule's `[min_weight, max_weight]`.
    pub weight: u16,
    /// True when the clamp actually engaged (counted for provenance).
    pub saturated: bool,
}

/// A trace-based plasticity rule.
///
/// Trace types are rule-specific. The row format stores pre-synaptic traces
/// as raw `u16`, so rules driving the row pipeline fix `PreTrace = u16`;
/// post traces never leave local memory.
pub trait PlasticityRule {
    /// Per-row pre-synaptic trace state.
    type PreTrace: Copy + Default;
    /// Per-neuron post-synaptic trace state.
    type PostTrace: Copy + Default;
    /// Accumulating state threaded through one merge walk.
    type UpdateState: Copy;

    fn initial_pre_trace(&self) -> Self::PreTrace;
    fn initial_post_trace(&self) -> Self::PostTrace;
    fn initial_update_state(&self) -> Self::UpdateState;

    /// Fold a new pre-synaptic spike at `time` into the trace, given the
    /// previous spike time and trace value.
    fn add_pre_spike(&self, time: u32, last_time: u32, last_trace: Self::PreTrace)
        -> Self::PreTrace;

    /// Fold a new post-synaptic spike at `time` into the trace.
    fn add_post_spike(
        &self,
        time: u32,
        last_time: u32,
        last_trace: Self::PostTrace,
    ) -> Self::PostTrace;

    /// Apply a pre-synaptic event crossed during the merge walk.
    #[allow(clippy::too_many_arguments)]
    fn apply_pre_event(
        &self,
        state: Self::UpdateState,
        time: u32,
        last_pre_time: u32,
        last_pre_trace: Self::PreTrace,
        last_post_time: u32,
        last_post_trace: Self::PostTrace,
    ) -> Self::UpdateState;

    /// Apply a post-synaptic event crossed during the merge walk.
    #[allow(clippy::too_many_arguments)]
    fn apply_post_event(
        &self,
        state: Self::UpdateState,
        time: u32,
        last_pre_time: u32,
        last_pre_trace: Self::PreTrace,
        last_post_time: u32,
        last_post_trace: Self::PostTrace,
    ) -> Self::UpdateState;

    /// Turn the accumulated state into a new clamped weight.
    ///
    /// An update state that saw no events must return `old_weight`
    /// unchanged.
    fn finalize(&self, state: Self::UpdateState, old_weight: u16) -> WeightUpdate;
}
